// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The status ingestor: reconciles provider callbacks with delivery records
//! and campaign counters.
//!
//! Events arrive in batches from the webhook handler, which has already
//! acked the provider. Each event is processed in isolation; a bad event is
//! counted and logged, never allowed to abort its batch.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wavecast_core::{advance, StatusEvent, Transition, WavecastError};
use wavecast_storage::queries::{campaigns, deliveries};
use wavecast_storage::Database;

/// Per-batch ingest accounting, logged after every batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Forward transitions persisted.
    pub applied: usize,
    /// Duplicate reports of the current status.
    pub noop: usize,
    /// Out-of-order reports that would have regressed a record.
    pub rejected: usize,
    /// Events whose provider message id matched no delivery.
    pub unmatched: usize,
    /// Events that hit a storage error.
    pub errors: usize,
}

/// Apply a batch of status events.
pub async fn ingest_status_events(db: &Database, events: &[StatusEvent]) -> IngestSummary {
    let mut summary = IngestSummary::default();
    for event in events {
        match ingest_one(db, event).await {
            Ok(Outcome::Applied) => summary.applied += 1,
            Ok(Outcome::Noop) => summary.noop += 1,
            Ok(Outcome::Rejected) => summary.rejected += 1,
            Err(WavecastError::CallbackMismatch {
                provider_message_id,
            }) => {
                warn!(
                    %provider_message_id,
                    status = %event.status,
                    "callback matches no delivery, dropped"
                );
                summary.unmatched += 1;
            }
            Err(e) => {
                warn!(
                    provider_message_id = %event.provider_message_id,
                    error = %e,
                    "status event failed to ingest"
                );
                summary.errors += 1;
            }
        }
    }
    summary
}

enum Outcome {
    Applied,
    Noop,
    Rejected,
}

async fn ingest_one(db: &Database, event: &StatusEvent) -> Result<Outcome, WavecastError> {
    let Some(delivery) =
        deliveries::find_by_provider_message_id(db, &event.provider_message_id).await?
    else {
        return Err(WavecastError::CallbackMismatch {
            provider_message_id: event.provider_message_id.clone(),
        });
    };

    match advance(delivery.status, event.status) {
        Transition::Apply(new_status) => {
            deliveries::record_transition(
                db,
                &delivery.id,
                new_status,
                event.error_code.clone(),
                event.error_message.clone(),
            )
            .await?;
            if !campaigns::apply_stat_delta(db, &delivery.campaign_id, delivery.status, new_status)
                .await?
            {
                warn!(
                    campaign_id = %delivery.campaign_id,
                    from = %delivery.status,
                    to = %new_status,
                    "stat delta skipped, counter already empty"
                );
            }
            debug!(
                delivery_id = %delivery.id,
                from = %delivery.status,
                to = %new_status,
                "delivery status advanced"
            );
            Ok(Outcome::Applied)
        }
        Transition::Noop => {
            debug!(
                delivery_id = %delivery.id,
                status = %event.status,
                "duplicate status callback ignored"
            );
            Ok(Outcome::Noop)
        }
        Transition::Rejected => {
            debug!(
                delivery_id = %delivery.id,
                current = %delivery.status,
                reported = %event.status,
                "out-of-order status callback rejected"
            );
            Ok(Outcome::Rejected)
        }
    }
}

/// Spawn the background task consuming webhook event batches.
pub fn spawn_ingest_task(
    db: Arc<Database>,
    mut events_rx: mpsc::Receiver<Vec<StatusEvent>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("status ingest task started");
        while let Some(batch) = events_rx.recv().await {
            let summary = ingest_status_events(&db, &batch).await;
            info!(
                applied = summary.applied,
                noop = summary.noop,
                rejected = summary.rejected,
                unmatched = summary.unmatched,
                errors = summary.errors,
                "status batch ingested"
            );
        }
        info!("status ingest task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_campaign_with_deliveries, setup_db};
    use wavecast_core::DeliveryStatus;

    fn event(pmid: &str, status: DeliveryStatus) -> StatusEvent {
        StatusEvent {
            provider_message_id: pmid.to_string(),
            status,
            timestamp: Some("1756400000".to_string()),
            recipient_id: None,
            error_code: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn delivered_callback_moves_counter_from_sent() {
        let (db, _dir) = setup_db().await;
        seed_campaign_with_deliveries(&db, "camp-1", &[("d-1", DeliveryStatus::Sent)]).await;
        deliveries::record_provider_message_id(&db, "d-1", "wamid.1")
            .await
            .unwrap();

        let summary =
            ingest_status_events(&db, &[event("wamid.1", DeliveryStatus::Delivered)]).await;
        assert_eq!(summary.applied, 1);

        let delivery = deliveries::get_delivery(&db, "d-1").await.unwrap().unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Delivered);
        assert!(delivery.delivered_at.is_some());

        let campaign = campaigns::get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!(campaign.stats.sent, 0);
        assert_eq!(campaign.stats.delivered, 1);
        assert_eq!(campaign.stats.total(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_and_out_of_order_callbacks_change_nothing() {
        let (db, _dir) = setup_db().await;
        seed_campaign_with_deliveries(&db, "camp-1", &[("d-1", DeliveryStatus::Delivered)]).await;
        deliveries::record_provider_message_id(&db, "d-1", "wamid.1")
            .await
            .unwrap();

        let summary = ingest_status_events(
            &db,
            &[
                event("wamid.1", DeliveryStatus::Delivered),
                event("wamid.1", DeliveryStatus::Sent),
            ],
        )
        .await;
        assert_eq!(summary.noop, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.applied, 0);

        let campaign = campaigns::get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!(campaign.stats.delivered, 1);
        assert_eq!(campaign.stats.total(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unmatched_callback_is_dropped_not_fatal() {
        let (db, _dir) = setup_db().await;
        seed_campaign_with_deliveries(&db, "camp-1", &[("d-1", DeliveryStatus::Sent)]).await;
        deliveries::record_provider_message_id(&db, "d-1", "wamid.1")
            .await
            .unwrap();

        // Unknown id first; the valid event after it must still apply.
        let summary = ingest_status_events(
            &db,
            &[
                event("wamid.GHOST", DeliveryStatus::Delivered),
                event("wamid.1", DeliveryStatus::Delivered),
            ],
        )
        .await;
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.applied, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_callback_records_error_details() {
        let (db, _dir) = setup_db().await;
        seed_campaign_with_deliveries(&db, "camp-1", &[("d-1", DeliveryStatus::Sent)]).await;
        deliveries::record_provider_message_id(&db, "d-1", "wamid.1")
            .await
            .unwrap();

        let mut failed = event("wamid.1", DeliveryStatus::Failed);
        failed.error_code = Some("131047".to_string());
        failed.error_message = Some("Re-engagement message".to_string());

        let summary = ingest_status_events(&db, &[failed]).await;
        assert_eq!(summary.applied, 1);

        let delivery = deliveries::get_delivery(&db, "d-1").await.unwrap().unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Failed);
        assert_eq!(delivery.error_code.as_deref(), Some("131047"));
        assert!(delivery.failed_at.is_some());

        let campaign = campaigns::get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!(campaign.stats.failed, 1);
        assert_eq!(campaign.stats.sent, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ingest_task_consumes_batches_from_channel() {
        let (db, _dir) = setup_db().await;
        seed_campaign_with_deliveries(&db, "camp-1", &[("d-1", DeliveryStatus::Sent)]).await;
        deliveries::record_provider_message_id(&db, "d-1", "wamid.1")
            .await
            .unwrap();

        let db = Arc::new(db);
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_ingest_task(db.clone(), rx);

        tx.send(vec![event("wamid.1", DeliveryStatus::Read)])
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        let delivery = deliveries::get_delivery(&db, "d-1").await.unwrap().unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Read);

        db.close().await.unwrap();
    }
}
