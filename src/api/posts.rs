//! Post endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::dto::{CreateCommentRequest, CreatePostRequest, UpdatePostRequest};
use crate::AppState;
use crate::data::{Comment, Post};
use crate::error::AppError;
use crate::metrics::{
    DB_QUERIES_TOTAL, DB_QUERY_DURATION_SECONDS, HTTP_REQUEST_DURATION_SECONDS,
    HTTP_REQUESTS_TOTAL, POSTS_TOTAL,
};

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_CONTENT_CHARS: usize = 1000;

// TODO: derive the author from the authenticated session once auth lands
const DEFAULT_AUTHOR_ID: i64 = 1;

fn validate_required(field: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_length(field: &str, value: &str, max_chars: usize) -> Result<(), AppError> {
    if value.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(())
}

/// POST /v1/posts
pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    // Start timing the request
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/v1/posts"])
        .start_timer();

    validate_required("title", &req.title)?;
    validate_length("title", &req.title, MAX_TITLE_CHARS)?;
    validate_required("content", &req.content)?;
    validate_length("content", &req.content, MAX_CONTENT_CHARS)?;

    let db_timer = DB_QUERY_DURATION_SECONDS
        .with_label_values(&["INSERT", "posts"])
        .start_timer();
    let post = state
        .db
        .create_post(DEFAULT_AUTHOR_ID, &req.title, &req.content, &req.tags)
        .await?;
    DB_QUERIES_TOTAL
        .with_label_values(&["INSERT", "posts"])
        .inc();
    db_timer.observe_duration();

    POSTS_TOTAL.inc();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/v1/posts", "201"])
        .inc();

    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /v1/posts/:id
///
/// The single-post read is the one path that loads the comment list.
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, AppError> {
    let mut post = state.db.get_post(id).await?;
    post.comments = state.db.comments_for_post(id).await?;

    Ok(Json(post))
}

/// PATCH /v1/posts/:id
///
/// Optimistic update: the post is resolved once, the partial payload is
/// merged over it, and the write is conditioned on the version that was
/// read. A concurrent writer that got there first surfaces as not-found;
/// the caller re-fetches and retries or reports the conflict.
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    if let Some(title) = &req.title {
        validate_length("title", title, MAX_TITLE_CHARS)?;
    }
    if let Some(content) = &req.content {
        validate_length("content", content, MAX_CONTENT_CHARS)?;
    }

    let mut post = state.db.get_post(id).await?;

    // Merge: absent fields keep their stored values
    if let Some(title) = req.title {
        post.title = title;
    }
    if let Some(content) = req.content {
        post.content = content;
    }

    let (version, updated_at) = state
        .db
        .update_post(post.id, &post.title, &post.content, post.version)
        .await?;
    post.version = version;
    post.updated_at = updated_at;

    Ok(Json(post))
}

/// DELETE /v1/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.db.delete_post(id).await?;
    POSTS_TOTAL.dec();

    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    validate_required("content", &req.content)?;
    validate_length("content", &req.content, MAX_CONTENT_CHARS)?;

    // Resolve the post first so an absent post is a 404, not a
    // foreign-key error
    let post = state.db.get_post(id).await?;
    let comment = state
        .db
        .create_comment(post.id, req.user_id, &req.content)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
