//! SQLite database operations
//!
//! All database access goes through this module. Every query future is
//! bounded by the configured deadline so a stalled backend cannot pin
//! request workers.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

fn encode_tags(tags: &[String]) -> Result<String, AppError> {
    serde_json::to_string(tags).map_err(|error| AppError::Internal(error.into()))
}

fn decode_tags(raw: &str) -> Result<Vec<String>, AppError> {
    serde_json::from_str(raw)
        .map_err(|error| AppError::Internal(anyhow::anyhow!("invalid tags column: {error}")))
}

fn post_from_row(row: &SqliteRow) -> Result<Post, AppError> {
    Ok(Post {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        tags: decode_tags(row.try_get::<String, _>("tags")?.as_str())?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        comments: Vec::new(),
        user: None,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment, AppError> {
    let user_id: i64 = row.try_get("user_id")?;
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        user_id,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        user: Some(UserSummary {
            id: user_id,
            username: row.try_get("username")?,
        }),
    })
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    /// * `max_connections` - Pool size
    /// * `query_timeout` - Deadline applied to every query
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(
        path: &Path,
        max_connections: u32,
        query_timeout: Duration,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Foreign keys must be on for comment cascade on post deletion.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self {
            pool,
            query_timeout,
        })
    }

    /// Bound a query future by the configured deadline.
    ///
    /// Elapsing the deadline drops the in-flight future, which releases the
    /// pooled connection, and surfaces an internal error.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::Internal(anyhow::anyhow!(
                "storage query timed out after {:?}",
                self.query_timeout
            ))),
        }
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    ///
    /// Duplicate username or email surfaces as a conflict.
    pub async fn create_user(&self, username: &str, email: &str) -> Result<User, AppError> {
        let created_at = Utc::now();
        let result = self
            .bounded(
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO users (username, email, created_at) VALUES (?, ?, ?) RETURNING id",
                )
                .bind(username)
                .bind(email)
                .bind(created_at)
                .fetch_one(&self.pool),
            )
            .await;

        let id = match result {
            Ok(id) => id,
            Err(AppError::Database(error)) if is_unique_violation(&error) => {
                return Err(AppError::Conflict(
                    "username or email is already taken".to_string(),
                ));
            }
            Err(error) => return Err(error),
        };

        Ok(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            created_at,
        })
    }

    /// Get user by ID
    pub async fn get_user(&self, id: i64) -> Result<User, AppError> {
        let row = self
            .bounded(
                sqlx::query("SELECT id, username, email, created_at FROM users WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else {
            return Err(AppError::NotFound);
        };

        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        self.bounded(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(&self.pool),
        )
        .await
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Record that `follower_id` follows `followed_id`
    ///
    /// A duplicate pair surfaces as a conflict; an unknown user id as a
    /// validation error.
    pub async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<(), AppError> {
        let result = self
            .bounded(
                sqlx::query(
                    "INSERT INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(follower_id)
                .bind(followed_id)
                .bind(Utc::now())
                .execute(&self.pool),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(AppError::Database(error)) if is_unique_violation(&error) => Err(
                AppError::Conflict("follow relation already exists".to_string()),
            ),
            Err(AppError::Database(error)) if is_foreign_key_violation(&error) => {
                Err(AppError::Validation("unknown user".to_string()))
            }
            Err(error) => Err(error),
        }
    }

    /// Remove a follow relation; removing an absent pair is not an error
    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<(), AppError> {
        self.bounded(
            sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
                .bind(follower_id)
                .bind(followed_id)
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a new post with version 1 and server-assigned timestamps
    pub async fn create_post(
        &self,
        user_id: i64,
        title: &str,
        content: &str,
        tags: &[String],
    ) -> Result<Post, AppError> {
        let now = Utc::now();
        let tags_json = encode_tags(tags)?;

        let result = self
            .bounded(
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO posts (user_id, title, content, tags, created_at, updated_at, version) \
                     VALUES (?, ?, ?, ?, ?, ?, 1) RETURNING id",
                )
                .bind(user_id)
                .bind(title)
                .bind(content)
                .bind(&tags_json)
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool),
            )
            .await;

        let id = match result {
            Ok(id) => id,
            Err(AppError::Database(error)) if is_foreign_key_violation(&error) => {
                return Err(AppError::Validation("author does not exist".to_string()));
            }
            Err(error) => return Err(error),
        };

        Ok(Post {
            id,
            user_id,
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.to_vec(),
            created_at: now,
            updated_at: now,
            version: 1,
            comments: Vec::new(),
            user: None,
        })
    }

    /// Get post by ID
    ///
    /// The returned post carries no comments or author summary; callers
    /// load those separately when the read path needs them.
    pub async fn get_post(&self, id: i64) -> Result<Post, AppError> {
        let row = self
            .bounded(
                sqlx::query(
                    "SELECT id, user_id, title, content, tags, created_at, updated_at, version \
                     FROM posts WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else {
            return Err(AppError::NotFound);
        };

        post_from_row(&row)
    }

    /// Conditionally update a post, advancing its version by exactly 1
    ///
    /// The predicate matches both the id and the version the caller last
    /// read; a concurrent writer that advanced the version first makes this
    /// statement match zero rows, which surfaces as not-found. No lock is
    /// held between the caller's read and this write.
    ///
    /// Returns the new version and the refreshed update timestamp.
    pub async fn update_post(
        &self,
        id: i64,
        title: &str,
        content: &str,
        expected_version: i64,
    ) -> Result<(i64, DateTime<Utc>), AppError> {
        let updated_at = Utc::now();

        let new_version = self
            .bounded(
                sqlx::query_scalar::<_, i64>(
                    "UPDATE posts SET title = ?, content = ?, updated_at = ?, version = version + 1 \
                     WHERE id = ? AND version = ? RETURNING version",
                )
                .bind(title)
                .bind(content)
                .bind(updated_at)
                .bind(id)
                .bind(expected_version)
                .fetch_optional(&self.pool),
            )
            .await?;

        match new_version {
            Some(version) => Ok((version, updated_at)),
            None => Err(AppError::NotFound),
        }
    }

    /// Delete post by ID
    ///
    /// Zero affected rows means the post was already gone. Comments cascade
    /// at the schema level.
    pub async fn delete_post(&self, id: i64) -> Result<(), AppError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM posts WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    pub async fn count_posts(&self) -> Result<i64, AppError> {
        self.bounded(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts").fetch_one(&self.pool),
        )
        .await
    }

    /// Override a post's creation time, for ordering tests
    pub async fn set_post_created_at_for_test(
        &self,
        id: i64,
        created_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.bounded(
            sqlx::query("UPDATE posts SET created_at = ? WHERE id = ?")
                .bind(created_at)
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Insert a comment on a post
    pub async fn create_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<Comment, AppError> {
        let created_at = Utc::now();
        let result = self
            .bounded(
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO comments (post_id, user_id, content, created_at) \
                     VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(post_id)
                .bind(user_id)
                .bind(content)
                .bind(created_at)
                .fetch_one(&self.pool),
            )
            .await;

        let id = match result {
            Ok(id) => id,
            Err(AppError::Database(error)) if is_foreign_key_violation(&error) => {
                return Err(AppError::Validation("unknown user".to_string()));
            }
            Err(error) => return Err(error),
        };

        Ok(Comment {
            id,
            post_id,
            user_id,
            content: content.to_string(),
            created_at,
            user: None,
        })
    }

    /// Get a post's comments with author summaries, newest first
    pub async fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let rows = self
            .bounded(
                sqlx::query(
                    "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, u.username \
                     FROM comments c \
                     JOIN users u ON u.id = c.user_id \
                     WHERE c.post_id = ? \
                     ORDER BY c.created_at DESC, c.id DESC",
                )
                .bind(post_id)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.iter().map(comment_from_row).collect()
    }

    // =========================================================================
    // Feed
    // =========================================================================

    /// Query the requester's feed
    ///
    /// One composite statement: visibility (own posts and followed authors'
    /// posts), case-insensitive substring search, tag-superset filter over
    /// the JSON tags column, comment-count aggregation, then ordering and
    /// the pagination window. Posts without comments report a count of 0.
    pub async fn feed(
        &self,
        requester_id: i64,
        query: &FeedQuery,
    ) -> Result<Vec<FeedItem>, AppError> {
        let tags_json = encode_tags(&query.tags)?;
        let direction = query.sort.as_sql();

        // Ties on created_at break on id in the same direction so pagination
        // windows stay reproducible. The direction comes from a fixed enum,
        // never from request text.
        let sql = format!(
            "SELECT p.id, p.user_id, p.title, p.content, p.tags, p.created_at, p.updated_at, \
                    p.version, u.username, COUNT(c.id) AS comment_count \
             FROM posts p \
             JOIN users u ON u.id = p.user_id \
             LEFT JOIN comments c ON c.post_id = p.id \
             WHERE (p.user_id = ? \
                    OR p.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)) \
               AND (? = '' OR p.title LIKE '%' || ? || '%' OR p.content LIKE '%' || ? || '%') \
               AND (? = '[]' OR NOT EXISTS ( \
                        SELECT 1 FROM json_each(?) AS want \
                        WHERE NOT EXISTS ( \
                            SELECT 1 FROM json_each(p.tags) AS have \
                            WHERE have.value = want.value))) \
             GROUP BY p.id, u.username \
             ORDER BY p.created_at {direction}, p.id {direction} \
             LIMIT ? OFFSET ?"
        );

        let rows = self
            .bounded(
                sqlx::query(&sql)
                    .bind(requester_id)
                    .bind(requester_id)
                    .bind(&query.search)
                    .bind(&query.search)
                    .bind(&query.search)
                    .bind(&tags_json)
                    .bind(&tags_json)
                    .bind(query.limit)
                    .bind(query.offset)
                    .fetch_all(&self.pool),
            )
            .await?;

        rows.iter()
            .map(|row| {
                let mut post = post_from_row(row)?;
                post.user = Some(UserSummary {
                    id: post.user_id,
                    username: row.try_get("username")?,
                });
                Ok(FeedItem {
                    post,
                    comment_count: row.try_get("comment_count")?,
                })
            })
            .collect()
    }
}
