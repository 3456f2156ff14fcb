// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wavecast serve` command implementation.
//!
//! Wires the full pipeline: SQLite storage, the Cloud API gateway, the
//! dispatch worker, the webhook ingest task, and the axum HTTP server.
//! Without sending credentials the server still runs (fan-out accepted,
//! jobs accumulate, callbacks ingested) but no worker is started.

use std::sync::Arc;

use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use wavecast_campaign::spawn_ingest_task;
use wavecast_config::WavecastConfig;
use wavecast_core::{MessagingGateway, WavecastError};
use wavecast_dispatch::DispatchService;
use wavecast_storage::Database;
use wavecast_whatsapp::{webhook_router, CloudApiGateway, WebhookState};

use crate::http::{api_router, ApiState};

/// Capacity of the webhook -> ingestor channel. Each entry is a whole
/// callback batch.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Runs the `wavecast serve` command until interrupted.
pub async fn run_serve(config: WavecastConfig) -> Result<(), WavecastError> {
    init_tracing(&config.server.log_level);
    info!("starting wavecast serve");

    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    info!(path = %config.storage.database_path, "database ready");

    let gateway: Option<Arc<dyn MessagingGateway>> = match CloudApiGateway::new(&config.whatsapp) {
        Ok(gateway) => Some(Arc::new(gateway)),
        Err(e) => {
            warn!(error = %e, "sending disabled");
            None
        }
    };

    let dispatch_handle = gateway.as_ref().map(|gateway| {
        let service = Arc::new(DispatchService::new(
            db.clone(),
            gateway.clone(),
            config.queue.clone(),
        ));
        service.start()
    });

    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let ingest_handle = spawn_ingest_task(db.clone(), events_rx);

    let api_state = ApiState {
        db: db.clone(),
        queue_config: config.queue.clone(),
        gateway,
    };
    let webhook_state = WebhookState {
        verify_token: config.webhook.verify_token.clone(),
        app_secret: config.whatsapp.app_secret.clone(),
        events_tx,
    };
    let app = api_router(api_state)
        .merge(webhook_router(webhook_state))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WavecastError::Internal(format!("failed to bind {addr}: {e}")))?;
    info!("wavecast listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| WavecastError::Internal(format!("server error: {e}")))?;

    info!("shutting down");
    if let Some(handle) = dispatch_handle {
        handle.shutdown().await;
    }
    // The ingest task ends once the webhook router (and its sender) drops.
    let _ = ingest_handle.await;
    db.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wavecast={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
