//! Data models
//!
//! Rust structs representing database entities and feed query parameters.
//! All ids are database-assigned integers; timestamps use chrono.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// User
// =============================================================================

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Author info embedded in posts and comments on read paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

// =============================================================================
// Post
// =============================================================================

/// A post
///
/// `comments` and `user` are derived, never persisted on the posts row:
/// comments are loaded on single-post fetch, the author summary on feed rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Starts at 1, incremented by exactly 1 on each successful update
    pub version: i64,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// A feed row: a post plus its aggregated comment count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub post: Post,
    pub comment_count: i64,
}

// =============================================================================
// Comment
// =============================================================================

/// A comment on a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

// =============================================================================
// Feed query
// =============================================================================

/// Sort direction over post creation time
///
/// Rendered into SQL from a fixed table; request input never reaches the
/// query text directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Normalized feed query parameters
///
/// `limit` and `offset` are clamped at the API boundary before this
/// struct is built, so the query itself never scans unbounded.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub limit: i64,
    pub offset: i64,
    pub sort: SortDirection,
    /// Case-insensitive substring over title and content; empty matches all
    pub search: String,
    /// A post matches if its tag set contains every requested tag
    pub tags: Vec<String>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            sort: SortDirection::Desc,
            search: String::new(),
            tags: Vec::new(),
        }
    }
}
