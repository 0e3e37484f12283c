//! Progress store: durable per-channel cursor.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::RwLock;

use walletpush_common::error::PollError;
use walletpush_common::types::{Channel, ProgressCursor};

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Current cursor for a channel, `None` on first run.
    async fn get(&self, channel: Channel) -> Result<Option<ProgressCursor>, PollError>;

    /// Atomically replace a channel's cursor.
    ///
    /// A write that would lower the stored height is ignored; only `reset`
    /// may rewind.
    async fn set(&self, channel: Channel, cursor: &ProgressCursor) -> Result<(), PollError>;

    /// Operator reset: force the cursor to `height` with an empty boundary set.
    async fn reset(&self, channel: Channel, height: u64) -> Result<(), PollError>;
}

/// Store backed by the `notification_progress` table.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn get(&self, channel: Channel) -> Result<Option<ProgressCursor>, PollError> {
        let row: Option<(i64, Json<Vec<String>>)> = sqlx::query_as(
            "SELECT last_height, last_tx_hashes FROM notification_progress WHERE channel = $1",
        )
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(height, Json(hashes))| {
            ProgressCursor::with_hashes(channel, height as u64, hashes)
        }))
    }

    async fn set(&self, channel: Channel, cursor: &ProgressCursor) -> Result<(), PollError> {
        let hashes: Vec<String> = cursor.last_notified_tx_hashes.iter().cloned().collect();

        let result = sqlx::query(
            r#"
            INSERT INTO notification_progress (channel, last_height, last_tx_hashes)
            VALUES ($1, $2, $3)
            ON CONFLICT (channel) DO UPDATE
                SET last_height = EXCLUDED.last_height,
                    last_tx_hashes = EXCLUDED.last_tx_hashes,
                    updated_at = NOW()
                WHERE notification_progress.last_height <= EXCLUDED.last_height
            "#,
        )
        .bind(channel.as_str())
        .bind(cursor.last_notified_height as i64)
        .bind(Json(hashes))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                channel = %channel,
                height = cursor.last_notified_height,
                "Ignored cursor write below stored height"
            );
        }
        Ok(())
    }

    async fn reset(&self, channel: Channel, height: u64) -> Result<(), PollError> {
        sqlx::query(
            r#"
            INSERT INTO notification_progress (channel, last_height, last_tx_hashes)
            VALUES ($1, $2, '[]'::jsonb)
            ON CONFLICT (channel) DO UPDATE
                SET last_height = EXCLUDED.last_height,
                    last_tx_hashes = EXCLUDED.last_tx_hashes,
                    updated_at = NOW()
            "#,
        )
        .bind(channel.as_str())
        .bind(height as i64)
        .execute(&self.pool)
        .await?;

        tracing::warn!(channel = %channel, height, "Progress cursor reset");
        Ok(())
    }
}

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct InMemoryProgressStore {
    rows: RwLock<HashMap<Channel, ProgressCursor>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn get(&self, channel: Channel) -> Result<Option<ProgressCursor>, PollError> {
        Ok(self.rows.read().await.get(&channel).cloned())
    }

    async fn set(&self, channel: Channel, cursor: &ProgressCursor) -> Result<(), PollError> {
        let mut rows = self.rows.write().await;
        let stale = rows
            .get(&channel)
            .is_some_and(|current| current.last_notified_height > cursor.last_notified_height);
        if !stale {
            rows.insert(channel, cursor.clone());
        }
        Ok(())
    }

    async fn reset(&self, channel: Channel, height: u64) -> Result<(), PollError> {
        self.rows
            .write()
            .await
            .insert(channel, ProgressCursor::new(channel, height));
        Ok(())
    }
}
