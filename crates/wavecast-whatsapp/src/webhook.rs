// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook surface for asynchronous delivery status callbacks.
//!
//! The provider is acknowledged with 200 before any reconciliation work
//! happens; parsed events go onto a channel for the background ingestor.
//! A non-200 response makes the provider re-deliver and eventually disable
//! the subscription, so the only rejections here are failed handshakes and
//! bad signatures.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use wavecast_core::{DeliveryStatus, StatusEvent};

type HmacSha256 = Hmac<Sha256>;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    /// Token echoed back during the subscription handshake.
    pub verify_token: Option<String>,
    /// App secret for payload signature verification. `None` skips checks.
    pub app_secret: Option<String>,
    /// Parsed status events, consumed by the ingest task.
    pub events_tx: mpsc::Sender<Vec<StatusEvent>>,
}

/// Routes for `GET /webhook` (handshake) and `POST /webhook` (callbacks).
pub fn webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(handle_handshake).post(handle_callback))
        .with_state(state)
}

/// Subscription handshake: echo the challenge when mode and token match.
pub fn verify_handshake(
    expected_token: Option<&str>,
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
) -> Option<String> {
    let expected = expected_token?;
    if mode == Some("subscribe") && token == Some(expected) {
        challenge.map(String::from)
    } else {
        None
    }
}

/// Verify the `sha256=<hex>` payload signature against the app secret.
///
/// Uses the Mac verifier rather than string equality so the comparison is
/// constant-time.
pub fn verify_signature(app_secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Some(hex_digest) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Extract delivery status events from a callback payload.
///
/// Walks `entry[].changes[].value.statuses[]`; message echoes and unknown
/// status strings are skipped with a warning, never an error. One payload
/// can carry events for many messages across many campaigns.
pub fn parse_status_events(body: &[u8]) -> Vec<StatusEvent> {
    let payload: CallbackPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "unparseable webhook payload dropped");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    for entry in payload.entry {
        for change in entry.changes {
            for status in change.value.statuses {
                let parsed: Result<DeliveryStatus, _> = status.status.parse();
                let Ok(delivery_status) = parsed else {
                    warn!(status = %status.status, "unknown callback status dropped");
                    continue;
                };
                let error = status.errors.into_iter().next();
                events.push(StatusEvent {
                    provider_message_id: status.id,
                    status: delivery_status,
                    timestamp: status.timestamp,
                    recipient_id: status.recipient_id,
                    error_code: error.as_ref().map(|e| e.code.to_string()),
                    error_message: error.and_then(|e| e.message.or(e.title)),
                });
            }
        }
    }
    events
}

/// GET /webhook: the provider's subscription handshake.
pub async fn handle_handshake(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match verify_handshake(
        state.verify_token.as_deref(),
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
    ) {
        Some(challenge) => {
            debug!("webhook handshake verified");
            (StatusCode::OK, challenge)
        }
        None => {
            warn!("webhook handshake rejected");
            (StatusCode::FORBIDDEN, String::new())
        }
    }
}

/// POST /webhook: status callbacks. Always 200 once the signature passes.
pub async fn handle_callback(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(secret) = &state.app_secret {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, &body, signature) {
            warn!("webhook signature verification failed");
            return (StatusCode::UNAUTHORIZED, "");
        }
    }

    let events = parse_status_events(&body);
    if !events.is_empty() {
        debug!(count = events.len(), "status events queued for ingest");
        // A full channel drops the batch rather than delaying the ack; the
        // provider re-delivers on its own schedule.
        if let Err(e) = state.events_tx.try_send(events) {
            warn!(error = %e, "status event channel full, batch dropped");
        }
    }

    (StatusCode::OK, "EVENT_RECEIVED")
}

#[derive(Debug, Deserialize)]
struct CallbackPayload {
    #[serde(default)]
    entry: Vec<CallbackEntry>,
}

#[derive(Debug, Deserialize)]
struct CallbackEntry {
    #[serde(default)]
    changes: Vec<CallbackChange>,
}

#[derive(Debug, Deserialize)]
struct CallbackChange {
    value: CallbackValue,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CallbackValue {
    statuses: Vec<CallbackStatus>,
}

#[derive(Debug, Deserialize)]
struct CallbackStatus {
    id: String,
    status: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    recipient_id: Option<String>,
    #[serde(default)]
    errors: Vec<CallbackError>,
}

#[derive(Debug, Deserialize)]
struct CallbackError {
    code: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
