//! Feed endpoint

use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use super::dto::FeedParams;
use crate::AppState;
use crate::data::{FeedItem, FeedQuery, SortDirection};
use crate::error::AppError;
use crate::metrics::{
    DB_QUERIES_TOTAL, DB_QUERY_DURATION_SECONDS, HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL,
};

const DEFAULT_FEED_LIMIT: i64 = 20;
const MAX_FEED_LIMIT: i64 = 100;
const MAX_FEED_OFFSET: i64 = 10_000;

/// Normalize raw query parameters into a bounded feed query.
///
/// Out-of-range windows are rejected rather than clamped so callers learn
/// about the bounds instead of silently getting a different page.
fn normalize_feed_params(params: FeedParams) -> Result<FeedQuery, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_FEED_LIMIT);
    if !(1..=MAX_FEED_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_FEED_LIMIT}"
        )));
    }

    let offset = params.offset.unwrap_or(0);
    if !(0..=MAX_FEED_OFFSET).contains(&offset) {
        return Err(AppError::Validation(format!(
            "offset must be between 0 and {MAX_FEED_OFFSET}"
        )));
    }

    let sort = match params.sort.as_deref() {
        None => SortDirection::Desc,
        Some(raw) => SortDirection::parse(raw)
            .ok_or_else(|| AppError::Validation("sort must be asc or desc".to_string()))?,
    };

    let search = params.search.unwrap_or_default();

    let tags = params
        .tags
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(FeedQuery {
        limit,
        offset,
        sort,
        search,
        tags,
    })
}

/// GET /v1/users/:id/feed
pub async fn get_feed(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<FeedItem>>, AppError> {
    // Start timing the request
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/v1/users/:id/feed"])
        .start_timer();

    let query = normalize_feed_params(params)?;

    // Resolve the requester once; an unknown requester is a 404, and the
    // resolved identity is passed down explicitly.
    let requester = state.db.get_user(user_id).await?;

    let db_timer = DB_QUERY_DURATION_SECONDS
        .with_label_values(&["SELECT", "posts"])
        .start_timer();
    let items = state.db.feed(requester.id, &query).await?;
    DB_QUERIES_TOTAL
        .with_label_values(&["SELECT", "posts"])
        .inc();
    db_timer.observe_duration();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/v1/users/:id/feed", "200"])
        .inc();

    Ok(Json(items))
}
