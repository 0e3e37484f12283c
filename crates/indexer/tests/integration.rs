//! Integration tests for the Postgres-backed progress store.
//!
//! These tests require a running PostgreSQL database and the `DATABASE_URL`
//! environment variable to be set. Run with:
//!
//! ```bash
//! DATABASE_URL="postgresql://..." cargo test -p walletpush-indexer --test integration -- --ignored --nocapture
//! ```

use sqlx::PgPool;

use walletpush_common::types::{Channel, ProgressCursor};
use walletpush_indexer::progress::{PgProgressStore, ProgressStore};

/// Create a store connected to the test database with an empty progress table.
async fn setup(pool: &PgPool) -> PgProgressStore {
    sqlx::migrate!("../../migrations").run(pool).await.unwrap();

    sqlx::query("DELETE FROM notification_progress")
        .execute(pool)
        .await
        .unwrap();

    PgProgressStore::new(pool.clone())
}

#[sqlx::test]
#[ignore] // Requires DATABASE_URL; run explicitly with --ignored
async fn test_cursor_absent_until_first_write(pool: PgPool) {
    let store = setup(&pool).await;

    let initial = store.get(Channel::PaymentReceived).await.unwrap();
    assert!(initial.is_none(), "Expected no cursor before first run");

    let cursor = ProgressCursor::with_hashes(Channel::PaymentReceived, 500, ["0xa", "0xb:3"]);
    store.set(Channel::PaymentReceived, &cursor).await.unwrap();

    let stored = store.get(Channel::PaymentReceived).await.unwrap();
    assert_eq!(stored, Some(cursor));
}

#[sqlx::test]
#[ignore]
async fn test_set_replaces_boundary_hashes(pool: PgPool) {
    let store = setup(&pool).await;
    let ch = Channel::PaymentRequested;

    store
        .set(ch, &ProgressCursor::with_hashes(ch, 100, ["0x1", "0x2"]))
        .await
        .unwrap();
    store
        .set(ch, &ProgressCursor::with_hashes(ch, 101, ["0x3"]))
        .await
        .unwrap();

    let stored = store.get(ch).await.unwrap().unwrap();
    assert_eq!(stored, ProgressCursor::with_hashes(ch, 101, ["0x3"]));
}

#[sqlx::test]
#[ignore]
async fn test_set_ignores_lower_height(pool: PgPool) {
    let store = setup(&pool).await;
    let ch = Channel::InviteRedeemed;

    store.set(ch, &ProgressCursor::new(ch, 1000)).await.unwrap();
    store.set(ch, &ProgressCursor::new(ch, 900)).await.unwrap();

    let row: (i64,) =
        sqlx::query_as("SELECT last_height FROM notification_progress WHERE channel = $1")
            .bind(ch.as_str())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(row.0, 1000, "Stored height must never decrease");
}

#[sqlx::test]
#[ignore]
async fn test_reset_rewinds_and_clears_hashes(pool: PgPool) {
    let store = setup(&pool).await;
    let ch = Channel::PaymentReceived;

    store
        .set(ch, &ProgressCursor::with_hashes(ch, 2000, ["0xdead"]))
        .await
        .unwrap();
    store.reset(ch, 1500).await.unwrap();

    let stored = store.get(ch).await.unwrap().unwrap();
    assert_eq!(stored, ProgressCursor::new(ch, 1500));
}

#[sqlx::test]
#[ignore]
async fn test_channels_are_stored_independently(pool: PgPool) {
    let store = setup(&pool).await;

    store
        .set(
            Channel::PaymentReceived,
            &ProgressCursor::new(Channel::PaymentReceived, 10),
        )
        .await
        .unwrap();
    store
        .set(
            Channel::InviteRedeemed,
            &ProgressCursor::new(Channel::InviteRedeemed, 20),
        )
        .await
        .unwrap();

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notification_progress")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 2);
    assert!(store.get(Channel::PaymentRequested).await.unwrap().is_none());
}
