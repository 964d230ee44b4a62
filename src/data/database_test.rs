//! Database tests

use super::*;
use crate::error::AppError;
use chrono::{TimeZone, Utc};
use std::time::Duration;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path, 5, Duration::from_secs(5))
        .await
        .unwrap();
    (db, temp_dir)
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_user_create_and_get() {
    let (db, _temp_dir) = create_test_db().await;

    let created = db.create_user("alice", "alice@example.com").await.unwrap();
    assert!(created.id >= 1);

    let retrieved = db.get_user(created.id).await.unwrap();
    assert_eq!(retrieved.id, created.id);
    assert_eq!(retrieved.username, "alice");
    assert_eq!(retrieved.email, "alice@example.com");
}

#[tokio::test]
async fn test_duplicate_username_is_a_conflict() {
    let (db, _temp_dir) = create_test_db().await;

    db.create_user("alice", "alice@example.com").await.unwrap();
    let error = db
        .create_user("alice", "other@example.com")
        .await
        .expect_err("duplicate username must fail");

    assert!(matches!(error, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_get_missing_user_is_not_found() {
    let (db, _temp_dir) = create_test_db().await;

    let error = db.get_user(42).await.expect_err("no such user");
    assert!(matches!(error, AppError::NotFound));
}

#[tokio::test]
async fn test_post_create_echoes_fields_and_starts_at_version_1() {
    let (db, _temp_dir) = create_test_db().await;

    let author = db.create_user("alice", "alice@example.com").await.unwrap();
    let tags = vec!["tag1".to_string(), "tag2".to_string()];
    let post = db
        .create_post(author.id, "Hello", "World", &tags)
        .await
        .unwrap();

    assert!(post.id >= 1);
    assert_eq!(post.user_id, author.id);
    assert_eq!(post.title, "Hello");
    assert_eq!(post.content, "World");
    assert_eq!(post.tags, tags);
    assert_eq!(post.version, 1);
    assert_eq!(post.created_at, post.updated_at);
}

#[tokio::test]
async fn test_create_post_with_unknown_author_is_a_validation_error() {
    let (db, _temp_dir) = create_test_db().await;

    let error = db
        .create_post(99, "Hello", "World", &[])
        .await
        .expect_err("author does not exist");

    assert!(matches!(error, AppError::Validation(_)));
}

#[tokio::test]
async fn test_get_post_is_idempotent() {
    let (db, _temp_dir) = create_test_db().await;

    let author = db.create_user("alice", "alice@example.com").await.unwrap();
    let post = db
        .create_post(author.id, "Hello", "World", &[])
        .await
        .unwrap();

    let first = db.get_post(post.id).await.unwrap();
    let second = db.get_post(post.id).await.unwrap();

    assert_eq!(first.title, second.title);
    assert_eq!(first.content, second.content);
    assert_eq!(first.tags, second.tags);
    assert_eq!(first.version, second.version);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(first.updated_at, second.updated_at);
}

#[tokio::test]
async fn test_update_advances_version_and_rejects_stale_writers() {
    let (db, _temp_dir) = create_test_db().await;

    let author = db.create_user("alice", "alice@example.com").await.unwrap();
    let post = db
        .create_post(author.id, "Hello", "World", &[])
        .await
        .unwrap();
    assert_eq!(post.version, 1);

    // First writer read version 1 and wins.
    let (version, updated_at) = db.update_post(post.id, "Hi", "World", 1).await.unwrap();
    assert_eq!(version, 2);
    assert!(updated_at >= post.updated_at);

    let stored = db.get_post(post.id).await.unwrap();
    assert_eq!(stored.title, "Hi");
    assert_eq!(stored.content, "World");
    assert_eq!(stored.version, 2);

    // A second writer that also read version 1 must be rejected, not
    // silently overwrite the winner.
    let error = db
        .update_post(post.id, "Stale", "Stale", 1)
        .await
        .expect_err("stale version must fail");
    assert!(matches!(error, AppError::NotFound));

    let stored = db.get_post(post.id).await.unwrap();
    assert_eq!(stored.title, "Hi");
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn test_concurrent_updates_have_exactly_one_winner() {
    let (db, _temp_dir) = create_test_db().await;

    let author = db.create_user("alice", "alice@example.com").await.unwrap();
    let post = db
        .create_post(author.id, "Hello", "World", &[])
        .await
        .unwrap();

    // Both writers hold version 1; the version predicate lets at most one
    // conditional write through.
    let (first, second) = tokio::join!(
        db.update_post(post.id, "first", "first", 1),
        db.update_post(post.id, "second", "second", 1),
    );

    let successes = [&first, &second]
        .iter()
        .filter(|result| result.is_ok())
        .count();
    assert_eq!(successes, 1);

    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(AppError::NotFound)));

    let stored = db.get_post(post.id).await.unwrap();
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn test_delete_post_twice_reports_not_found() {
    let (db, _temp_dir) = create_test_db().await;

    let author = db.create_user("alice", "alice@example.com").await.unwrap();
    let post = db
        .create_post(author.id, "Hello", "World", &[])
        .await
        .unwrap();

    db.delete_post(post.id).await.unwrap();

    let error = db.delete_post(post.id).await.expect_err("already deleted");
    assert!(matches!(error, AppError::NotFound));

    let error = db.get_post(post.id).await.expect_err("gone");
    assert!(matches!(error, AppError::NotFound));
}

#[tokio::test]
async fn test_delete_missing_post_reports_not_found() {
    let (db, _temp_dir) = create_test_db().await;

    let error = db.delete_post(42).await.expect_err("no such post");
    assert!(matches!(error, AppError::NotFound));
}

#[tokio::test]
async fn test_deleting_a_post_cascades_to_its_comments() {
    let (db, _temp_dir) = create_test_db().await;

    let author = db.create_user("alice", "alice@example.com").await.unwrap();
    let post = db
        .create_post(author.id, "Hello", "World", &[])
        .await
        .unwrap();
    db.create_comment(post.id, author.id, "First!").await.unwrap();

    db.delete_post(post.id).await.unwrap();

    let comments = db.comments_for_post(post.id).await.unwrap();
    assert!(comments.is_empty());
}

#[tokio::test]
async fn test_comments_carry_author_summaries_newest_first() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = db.create_user("alice", "alice@example.com").await.unwrap();
    let bob = db.create_user("bob", "bob@example.com").await.unwrap();
    let post = db
        .create_post(alice.id, "Hello", "World", &[])
        .await
        .unwrap();

    db.create_comment(post.id, alice.id, "first comment")
        .await
        .unwrap();
    db.create_comment(post.id, bob.id, "second comment")
        .await
        .unwrap();

    let comments = db.comments_for_post(post.id).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].content, "second comment");
    assert_eq!(
        comments[0].user.as_ref().map(|u| u.username.as_str()),
        Some("bob")
    );
    assert_eq!(comments[1].content, "first comment");
    assert_eq!(
        comments[1].user.as_ref().map(|u| u.username.as_str()),
        Some("alice")
    );
}

#[tokio::test]
async fn test_follow_twice_is_a_conflict() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = db.create_user("alice", "alice@example.com").await.unwrap();
    let bob = db.create_user("bob", "bob@example.com").await.unwrap();

    db.follow(alice.id, bob.id).await.unwrap();
    let error = db
        .follow(alice.id, bob.id)
        .await
        .expect_err("duplicate follow must fail");
    assert!(matches!(error, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_unfollow_is_idempotent() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = db.create_user("alice", "alice@example.com").await.unwrap();
    let bob = db.create_user("bob", "bob@example.com").await.unwrap();

    db.follow(alice.id, bob.id).await.unwrap();
    db.unfollow(alice.id, bob.id).await.unwrap();
    // Removing an absent pair still succeeds.
    db.unfollow(alice.id, bob.id).await.unwrap();
}

#[tokio::test]
async fn test_follow_unknown_user_is_a_validation_error() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = db.create_user("alice", "alice@example.com").await.unwrap();

    let error = db
        .follow(alice.id, 99)
        .await
        .expect_err("unknown followed user must fail");
    assert!(matches!(error, AppError::Validation(_)));
}

// =============================================================================
// Feed
// =============================================================================

async fn feed_fixture(db: &Database) -> (User, User, User) {
    let alice = db.create_user("alice", "alice@example.com").await.unwrap();
    let bob = db.create_user("bob", "bob@example.com").await.unwrap();
    let carol = db.create_user("carol", "carol@example.com").await.unwrap();
    db.follow(alice.id, bob.id).await.unwrap();
    (alice, bob, carol)
}

#[tokio::test]
async fn test_feed_shows_own_and_followed_posts_only() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, bob, carol) = feed_fixture(&db).await;

    db.create_post(alice.id, "mine", "alice writes", &[])
        .await
        .unwrap();
    db.create_post(bob.id, "followed", "bob writes", &[])
        .await
        .unwrap();
    db.create_post(carol.id, "hidden", "carol writes", &[])
        .await
        .unwrap();

    let items = db.feed(alice.id, &FeedQuery::default()).await.unwrap();

    let titles: Vec<_> = items.iter().map(|i| i.post.title.as_str()).collect();
    assert_eq!(items.len(), 2);
    assert!(titles.contains(&"mine"));
    assert!(titles.contains(&"followed"));
    assert!(!titles.contains(&"hidden"));
}

#[tokio::test]
async fn test_feed_rows_carry_author_and_comment_count() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, bob, _carol) = feed_fixture(&db).await;

    let commented = db
        .create_post(bob.id, "busy", "has comments", &[])
        .await
        .unwrap();
    db.create_post(alice.id, "quiet", "no comments", &[])
        .await
        .unwrap();
    db.create_comment(commented.id, alice.id, "one").await.unwrap();
    db.create_comment(commented.id, bob.id, "two").await.unwrap();

    let items = db.feed(alice.id, &FeedQuery::default()).await.unwrap();
    assert_eq!(items.len(), 2);

    let busy = items.iter().find(|i| i.post.title == "busy").unwrap();
    assert_eq!(busy.comment_count, 2);
    assert_eq!(
        busy.post.user.as_ref().map(|u| u.username.as_str()),
        Some("bob")
    );

    // Posts with zero comments are reported with count 0, not excluded.
    let quiet = items.iter().find(|i| i.post.title == "quiet").unwrap();
    assert_eq!(quiet.comment_count, 0);
    assert!(quiet.post.comments.is_empty());
}

#[tokio::test]
async fn test_feed_tag_filter_matches_supersets() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, _bob, _carol) = feed_fixture(&db).await;

    let both = vec!["tag1".to_string(), "tag2".to_string()];
    db.create_post(alice.id, "tagged", "both tags", &both)
        .await
        .unwrap();
    db.create_post(alice.id, "untagged", "no tags", &[])
        .await
        .unwrap();

    // A post with {tag1, tag2} matches a query for {tag1}.
    let query = FeedQuery {
        tags: vec!["tag1".to_string()],
        ..FeedQuery::default()
    };
    let items = db.feed(alice.id, &query).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].post.title, "tagged");

    // A query for a tag the post does not carry matches nothing; a post
    // with no tags never matches a non-empty filter.
    let query = FeedQuery {
        tags: vec!["tag1".to_string(), "tag3".to_string()],
        ..FeedQuery::default()
    };
    let items = db.feed(alice.id, &query).await.unwrap();
    assert!(items.is_empty());

    // An empty tag filter matches everything.
    let items = db.feed(alice.id, &FeedQuery::default()).await.unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn test_feed_search_is_case_insensitive_over_title_and_content() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, _bob, _carol) = feed_fixture(&db).await;

    db.create_post(alice.id, "Say Hello", "greetings", &[])
        .await
        .unwrap();
    db.create_post(alice.id, "quiet", "a hidden HELLO inside", &[])
        .await
        .unwrap();
    db.create_post(alice.id, "unrelated", "nothing here", &[])
        .await
        .unwrap();

    let query = FeedQuery {
        search: "hello".to_string(),
        ..FeedQuery::default()
    };
    let items = db.feed(alice.id, &query).await.unwrap();

    let titles: Vec<_> = items.iter().map(|i| i.post.title.as_str()).collect();
    assert_eq!(items.len(), 2);
    assert!(titles.contains(&"Say Hello"));
    assert!(titles.contains(&"quiet"));
}

#[tokio::test]
async fn test_feed_pagination_windows_the_sorted_results() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, _bob, _carol) = feed_fixture(&db).await;

    for i in 0..5 {
        let post = db
            .create_post(alice.id, &format!("post {i}"), "content", &[])
            .await
            .unwrap();
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, i).unwrap();
        db.set_post_created_at_for_test(post.id, created_at)
            .await
            .unwrap();
    }

    // Ascending, limit 2 offset 2 -> posts 2 and 3.
    let query = FeedQuery {
        limit: 2,
        offset: 2,
        sort: SortDirection::Asc,
        ..FeedQuery::default()
    };
    let items = db.feed(alice.id, &query).await.unwrap();
    let titles: Vec<_> = items.iter().map(|i| i.post.title.as_str()).collect();
    assert_eq!(titles, vec!["post 2", "post 3"]);

    // An offset past the end yields an empty page, not an error.
    let query = FeedQuery {
        limit: 2,
        offset: 100,
        sort: SortDirection::Asc,
        ..FeedQuery::default()
    };
    let items = db.feed(alice.id, &query).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_feed_orders_by_created_at_with_id_tie_break() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, _bob, _carol) = feed_fixture(&db).await;

    let same_instant = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let mut ids = Vec::new();
    for i in 0..3 {
        let post = db
            .create_post(alice.id, &format!("tied {i}"), "content", &[])
            .await
            .unwrap();
        db.set_post_created_at_for_test(post.id, same_instant)
            .await
            .unwrap();
        ids.push(post.id);
    }

    let query = FeedQuery {
        sort: SortDirection::Asc,
        ..FeedQuery::default()
    };
    let items = db.feed(alice.id, &query).await.unwrap();
    let got: Vec<_> = items.iter().map(|i| i.post.id).collect();
    assert_eq!(got, ids);

    let query = FeedQuery {
        sort: SortDirection::Desc,
        ..FeedQuery::default()
    };
    let items = db.feed(alice.id, &query).await.unwrap();
    let got: Vec<_> = items.iter().map(|i| i.post.id).collect();
    let reversed: Vec<_> = ids.iter().rev().copied().collect();
    assert_eq!(got, reversed);
}
