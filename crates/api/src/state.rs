//! Shared application state for the Axum API server.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use walletpush_common::config::AppConfig;
use walletpush_indexer::scheduler::PollScheduler;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PollScheduler>,
    pub config: AppConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(scheduler: Arc<PollScheduler>, config: AppConfig) -> Self {
        Self {
            scheduler,
            config,
            started_at: Utc::now(),
        }
    }
}
