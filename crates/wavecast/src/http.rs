// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API surface: campaign management, delivery queries, queue
//! observability, and template listing.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use wavecast_config::QueueConfig;
use wavecast_core::{DeliveryStatus, MessagingGateway, WavecastError};
use wavecast_storage::queries::deliveries::DeliveryFilter;
use wavecast_storage::queries::{deliveries, queue};
use wavecast_storage::Database;
use wavecast_campaign::{campaign_analytics, fan_out, list_campaigns, read_campaign, FanOutRequest};

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<Database>,
    pub queue_config: QueueConfig,
    /// `None` when sending credentials are not configured.
    pub gateway: Option<Arc<dyn MessagingGateway>>,
}

/// Router for everything under `/api`.
pub fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/campaigns", get(get_campaigns).post(post_campaign))
        .route("/api/campaigns/{id}", get(get_campaign))
        .route("/api/campaigns/{id}/analytics", get(get_campaign_analytics))
        .route("/api/deliveries", get(get_deliveries))
        .route("/api/queue/stats", get(get_queue_stats))
        .route("/api/templates", get(get_templates))
        .route("/api/share-link", get(get_share_link))
        .with_state(state)
}

/// Map a pipeline error onto an HTTP response.
fn error_response(err: WavecastError) -> Response {
    let (status, message) = match &err {
        WavecastError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        WavecastError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        WavecastError::Gateway { .. } => (StatusCode::BAD_GATEWAY, err.to_string()),
        WavecastError::Config(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        _ => {
            error!(error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

async fn post_campaign(
    State(state): State<ApiState>,
    Json(request): Json<FanOutRequest>,
) -> Response {
    match fan_out(&state.db, &state.queue_config, request).await {
        Ok((campaign, queued)) => (
            StatusCode::CREATED,
            Json(json!({ "campaign": campaign, "queued": queued })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_campaigns(
    State(state): State<ApiState>,
    Query(pagination): Query<Pagination>,
) -> Response {
    match list_campaigns(&state.db, pagination.page, pagination.limit.clamp(1, 100)).await {
        Ok((campaigns, total)) => Json(json!({
            "campaigns": campaigns,
            "total": total,
            "page": pagination.page,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_campaign(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match read_campaign(&state.db, &id).await {
        Ok(Some(detail)) => Json(detail).into_response(),
        Ok(None) => error_response(WavecastError::NotFound {
            entity: "campaign",
            id,
        }),
        Err(e) => error_response(e),
    }
}

async fn get_campaign_analytics(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Response {
    match campaign_analytics(&state.db, &id).await {
        Ok(Some(analytics)) => Json(analytics).into_response(),
        Ok(None) => error_response(WavecastError::NotFound {
            entity: "campaign",
            id,
        }),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct DeliveryQuery {
    #[serde(default)]
    campaign_id: Option<String>,
    #[serde(default)]
    status: Option<DeliveryStatus>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

async fn get_deliveries(
    State(state): State<ApiState>,
    Query(query): Query<DeliveryQuery>,
) -> Response {
    let filter = DeliveryFilter {
        campaign_id: query.campaign_id,
        status: query.status,
        from: query.from,
        to: query.to,
    };
    match deliveries::list_deliveries(&state.db, &filter, query.page, query.limit.clamp(1, 100))
        .await
    {
        Ok((rows, total)) => Json(json!({
            "deliveries": rows,
            "total": total,
            "page": query.page,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_queue_stats(State(state): State<ApiState>) -> Response {
    match queue::stats(&state.db, wavecast_campaign::QUEUE_NAME).await {
        Ok(stats) => Json(json!({
            "waiting": stats.waiting,
            "active": stats.active,
            "completed": stats.completed,
            "failed": stats.failed,
            "delayed": stats.delayed,
            "total": stats.total(),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct ShareLinkQuery {
    #[serde(default)]
    phone_number: Option<String>,
    text: String,
}

/// Build a `wa.me` click-to-chat link for the given message text.
async fn get_share_link(Query(query): Query<ShareLinkQuery>) -> Response {
    if query.text.trim().is_empty() {
        return error_response(WavecastError::Validation(
            "share link text must not be empty".to_string(),
        ));
    }
    let link = wavecast_whatsapp::share_link(query.phone_number.as_deref(), &query.text);
    Json(json!({ "link": link })).into_response()
}

async fn get_templates(State(state): State<ApiState>) -> Response {
    let Some(gateway) = &state.gateway else {
        return error_response(WavecastError::Config(
            "sending credentials are not configured".to_string(),
        ));
    };
    match gateway.fetch_approved_templates().await {
        Ok(templates) => Json(json!({ "templates": templates })).into_response(),
        Err(e) => error_response(e),
    }
}
