//! Start/stop hooks invoked by the hosting platform.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/_ah/start", get(start))
        .route("/_ah/stop", get(stop))
}

/// GET /_ah/start — Start polling if not already running.
async fn start(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.scheduler.run().await;
    tracing::info!("Poll scheduler started via lifecycle hook");
    Json(json!({ "running": true }))
}

/// GET /_ah/stop — Stop polling and wait for in-flight cycles.
async fn stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.scheduler.stop().await;
    tracing::info!("Poll scheduler stopped via lifecycle hook");
    Json(json!({ "running": false }))
}
