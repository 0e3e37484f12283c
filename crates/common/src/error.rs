use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Http(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Failures that end a poll cycle without committing progress.
///
/// None of these are fatal: the cursor is left untouched and the next tick
/// retries from the same point.
#[derive(Debug, Error)]
pub enum PollError {
    /// Explorer or push backend unreachable, timed out, or overloaded.
    #[error("Transient upstream error: {0}")]
    TransientUpstream(String),

    /// Explorer response failed validation.
    #[error("Malformed explorer data: {0}")]
    MalformedData(String),

    /// Progress store read or write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl PollError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PollError::TransientUpstream(_))
    }
}

impl From<sqlx::Error> for PollError {
    fn from(err: sqlx::Error) -> Self {
        PollError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let response = AppError::Http("explorer down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = AppError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_only_upstream_errors_are_transient() {
        assert!(PollError::TransientUpstream("timeout".into()).is_transient());
        assert!(!PollError::MalformedData("bad hex".into()).is_transient());
        assert!(!PollError::Persistence("down".into()).is_transient());
    }
}
