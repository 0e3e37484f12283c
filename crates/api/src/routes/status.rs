//! Service banner and poller status.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use walletpush_common::types::Channel;
use walletpush_indexer::poller::ChannelSnapshot;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/status", get(status))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: String,
    pub environment: String,
    pub running: bool,
    pub last_block_notified: BTreeMap<Channel, Option<u64>>,
    pub channels: Vec<ChannelSnapshot>,
    pub service_start_time: DateTime<Utc>,
    pub service_run_duration: String,
}

/// GET / — Plain-text banner.
async fn banner(State(state): State<AppState>) -> String {
    format!(
        "Wallet notification service {}. See /status for details.",
        state.config.version
    )
}

/// GET /status — Scheduler state and the last notified block per channel.
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let channels = state.scheduler.snapshots().await;
    let last_block_notified = channels
        .iter()
        .map(|s| (s.channel, s.last_block_notified))
        .collect();
    let minutes = (Utc::now() - state.started_at).num_minutes();

    Json(StatusResponse {
        version: state.config.version.clone(),
        environment: state.config.environment.clone(),
        running: state.scheduler.is_running().await,
        last_block_notified,
        channels,
        service_start_time: state.started_at,
        service_run_duration: format!("{minutes} minutes"),
    })
}
