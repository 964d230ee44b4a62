//! Seed-data generation
//!
//! Populates a database with a deterministic set of users, posts, and
//! comments for local development. Invoked by the `seed` binary.

use super::Database;
use crate::error::AppError;

const SEED_USERS: usize = 100;
const SEED_POSTS: usize = 200;
const SEED_COMMENTS: usize = 500;

/// Populate the database with generated users, posts, and comments.
///
/// Stops at the first storage error; seeding an already-seeded database
/// fails on the username uniqueness constraint.
pub async fn seed(db: &Database) -> Result<(), AppError> {
    let mut user_ids = Vec::with_capacity(SEED_USERS);
    for i in 0..SEED_USERS {
        let user = db
            .create_user(&format!("user{i}"), &format!("user{i}@example.com"))
            .await?;
        user_ids.push(user.id);
    }
    tracing::info!(count = SEED_USERS, "Seeded users");

    let tags = vec!["tag1".to_string(), "tag2".to_string()];
    let mut post_ids = Vec::with_capacity(SEED_POSTS);
    for i in 0..SEED_POSTS {
        let author = user_ids[i % user_ids.len()];
        let post = db
            .create_post(
                author,
                &format!("Post Title {i}"),
                &format!("This is the content of post number {i}"),
                &tags,
            )
            .await?;
        post_ids.push(post.id);
    }
    tracing::info!(count = SEED_POSTS, "Seeded posts");

    for i in 0..SEED_COMMENTS {
        let author = user_ids[i % user_ids.len()];
        let post = post_ids[i % post_ids.len()];
        db.create_comment(post, author, &format!("This is a comment number {i}"))
            .await?;
    }
    tracing::info!(count = SEED_COMMENTS, "Seeded comments");

    tracing::info!("Database seeding completed successfully");
    Ok(())
}
