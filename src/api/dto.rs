//! Request payloads for the REST API
//!
//! Entity responses serialize the `data` models directly; only inbound
//! payload shapes live here.

use serde::Deserialize;

/// Post creation payload
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial post update payload
///
/// Absent fields leave the stored value unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Comment creation payload
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub user_id: i64,
    pub content: String,
}

/// User creation payload
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

/// Follow/unfollow payload: the acting user
#[derive(Debug, Deserialize)]
pub struct FollowRequest {
    pub user_id: i64,
}

/// Raw feed query parameters, normalized before use
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub search: Option<String>,
    /// Comma-separated tag list
    pub tags: Option<String>,
}
