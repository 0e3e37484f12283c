//! Push backend client.
//!
//! Speaks the FCM HTTP v1 message shape. Credential loading happens outside
//! this crate; the backend only receives an already-minted bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

use walletpush_common::error::AppError;
use walletpush_common::types::{DeliveryOutcome, NotificationPayload};

/// Push-notification backend collaborator.
#[async_trait]
pub trait PushBackend: Send + Sync {
    /// Deliver `payload` to the device identified by `token`.
    ///
    /// Never errors: every failure is classified into a `DeliveryOutcome`.
    async fn send(
        &self,
        token: &str,
        payload: &NotificationPayload,
        ttl: Duration,
    ) -> DeliveryOutcome;
}

/// FCM HTTP v1 push backend.
#[derive(Debug, Clone)]
pub struct FcmPushBackend {
    http_client: Client,
    send_url: String,
    auth_token: Option<String>,
}

impl FcmPushBackend {
    pub fn new(send_url: String, auth_token: Option<String>) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            send_url,
            auth_token,
        })
    }

    fn message(token: &str, payload: &NotificationPayload, ttl: Duration) -> serde_json::Value {
        json!({
            "message": {
                "token": token,
                "notification": {
                    "title": payload.title,
                    "body": payload.body,
                },
                "data": payload.data,
                "android": {
                    "ttl": format!("{}s", ttl.as_secs()),
                    "priority": "high",
                },
            }
        })
    }
}

/// Map a backend HTTP response to a delivery outcome.
fn classify_response(status: StatusCode, body: &str) -> DeliveryOutcome {
    if status.is_success() {
        DeliveryOutcome::Delivered
    } else if status == StatusCode::NOT_FOUND || body.contains("UNREGISTERED") {
        DeliveryOutcome::NoRegisteredDevice
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DeliveryOutcome::BackendUnavailable
    } else {
        DeliveryOutcome::Rejected
    }
}

#[async_trait]
impl PushBackend for FcmPushBackend {
    async fn send(
        &self,
        token: &str,
        payload: &NotificationPayload,
        ttl: Duration,
    ) -> DeliveryOutcome {
        let mut request = self
            .http_client
            .post(&self.send_url)
            .json(&Self::message(token, payload, ttl));
        if let Some(auth) = &self.auth_token {
            request = request.bearer_auth(auth);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Push backend request failed");
                return DeliveryOutcome::BackendUnavailable;
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let outcome = classify_response(status, &body);

        if outcome != DeliveryOutcome::Delivered {
            tracing::debug!(status = %status, body = %body, outcome = %outcome, "Push not delivered");
        }
        outcome
    }
}
