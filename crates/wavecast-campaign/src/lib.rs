// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign orchestration for Wavecast: fan-out, status ingestion, and the
//! read surface with lazy completion inference.
//!
//! Two concurrent writers touch a campaign aggregate after fan-out: the
//! delivery worker (send outcomes) and the status ingestor (webhook
//! callbacks). Both go through the same storage primitives -- the pure
//! `advance` transition plus atomic paired counter deltas -- so the counter
//! sum always equals the recipient count.

pub mod fanout;
pub mod ingest;
pub mod read;

#[cfg(test)]
pub(crate) mod test_support;

pub use fanout::{fan_out, FanOutRequest};
pub use ingest::{ingest_status_events, spawn_ingest_task, IngestSummary};
pub use read::{campaign_analytics, list_campaigns, read_campaign, CampaignAnalytics, CampaignDetail};
pub use wavecast_storage::queries::queue::QUEUE_NAME;

#[cfg(test)]
mod pipeline_tests {
    //! End-to-end: fan-out, worker drain, callback reconciliation,
    //! completion inference.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use wavecast_config::QueueConfig;
    use wavecast_core::{
        ApprovedTemplate, CampaignStatus, DeliveryStatus, MessagingGateway, ProviderMessageId,
        StatusEvent, WavecastError,
    };
    use wavecast_dispatch::{DispatchService, Tick};
    use wavecast_storage::queries::deliveries::{list_deliveries, DeliveryFilter};
    use wavecast_storage::Database;

    use crate::test_support::{seed_contact, setup_db};
    use crate::{fan_out, ingest_status_events, read_campaign, FanOutRequest};

    /// Hands out sequential provider message ids.
    struct SequencedGateway {
        counter: Mutex<u32>,
    }

    #[async_trait]
    impl MessagingGateway for SequencedGateway {
        async fn send_template(
            &self,
            _to: &str,
            _template_name: &str,
            _language_code: &str,
            _variables: &[String],
        ) -> Result<ProviderMessageId, WavecastError> {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            Ok(ProviderMessageId(format!("wamid.{counter}")))
        }

        async fn fetch_approved_templates(&self) -> Result<Vec<ApprovedTemplate>, WavecastError> {
            Ok(Vec::new())
        }
    }

    async fn make_all_due(db: &Database) {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE dispatch_jobs
                     SET available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-1 minute')
                     WHERE status = 'waiting'",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    fn status_event(pmid: &str, status: DeliveryStatus) -> StatusEvent {
        StatusEvent {
            provider_message_id: pmid.to_string(),
            status,
            timestamp: None,
            recipient_id: None,
            error_code: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn campaign_lifecycle_from_fan_out_to_completion() {
        let (db, _dir) = setup_db().await;
        let db = Arc::new(db);
        for i in 0..3 {
            seed_contact(&db, &format!("c{i}"), &format!("155500000{i}"), &[], true).await;
        }

        let (campaign, count) = fan_out(
            &db,
            &QueueConfig::default(),
            FanOutRequest {
                name: "Product launch".to_string(),
                description: None,
                template_name: "launch_announcement".to_string(),
                template_language: "en".to_string(),
                target_tags: vec![],
                variables: vec![],
            },
        )
        .await
        .unwrap();
        assert_eq!(count, 3);

        // Drain the queue through the worker, collapsing the stagger.
        let service = DispatchService::new(
            db.clone(),
            Arc::new(SequencedGateway {
                counter: Mutex::new(0),
            }),
            QueueConfig::default(),
        );
        loop {
            make_all_due(&db).await;
            match service.run_once().await.unwrap() {
                Tick::Idle => break,
                Tick::Processed => {}
                Tick::Throttled(_) => panic!("default budget should cover 3 sends"),
            }
        }

        let detail = read_campaign(&db, &campaign.id).await.unwrap().unwrap();
        assert_eq!(detail.campaign.stats.sent, 3);
        assert_eq!(detail.campaign.stats.queued, 0);
        // Nothing queued or sending remains, so the read flips completion.
        assert_eq!(detail.campaign.status, CampaignStatus::Completed);

        // Provider callbacks: all delivered, then one read.
        let summary = ingest_status_events(
            &db,
            &[
                status_event("wamid.1", DeliveryStatus::Delivered),
                status_event("wamid.2", DeliveryStatus::Delivered),
                status_event("wamid.3", DeliveryStatus::Delivered),
            ],
        )
        .await;
        assert_eq!(summary.applied, 3);

        let detail = read_campaign(&db, &campaign.id).await.unwrap().unwrap();
        assert_eq!(detail.campaign.stats.sent, 0);
        assert_eq!(detail.campaign.stats.delivered, 3);
        assert_eq!(detail.campaign.stats.total(), 3);

        let summary =
            ingest_status_events(&db, &[status_event("wamid.2", DeliveryStatus::Read)]).await;
        assert_eq!(summary.applied, 1);

        let analytics = crate::campaign_analytics(&db, &campaign.id).await.unwrap().unwrap();
        assert_eq!(analytics.delivery_rate, 1.0);
        assert!((analytics.read_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(analytics.failure_rate, 0.0);

        // Every delivery carries its provider id and a terminal-or-later
        // status; none regressed.
        let filter = DeliveryFilter {
            campaign_id: Some(campaign.id.clone()),
            ..Default::default()
        };
        let (rows, _) = list_deliveries(&db, &filter, 1, 10).await.unwrap();
        for row in rows {
            assert!(row.provider_message_id.is_some());
            assert!(matches!(
                row.status,
                DeliveryStatus::Delivered | DeliveryStatus::Read
            ));
        }

        db.close().await.unwrap();
    }
}
