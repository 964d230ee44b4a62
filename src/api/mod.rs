//! API layer
//!
//! HTTP handlers for:
//! - Users and follow relations
//! - Posts and comments
//! - The follower-aware feed
//! - Metrics (Prometheus)

mod dto;
mod feed;
mod metrics;
mod posts;
mod users;

pub use dto::*;
pub use metrics::metrics_router;

use axum::Router;
use axum::routing::{delete, get, post, put};

use crate::AppState;

/// Routes mounted under `/v1`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/:id",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/:id/comments", post(posts::create_comment))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/follow", put(users::follow_user))
        .route("/users/:id/unfollow", delete(users::unfollow_user))
        .route("/users/:id/feed", get(feed::get_feed))
}
