// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixtures for the crate's tests.

use tempfile::tempdir;
use wavecast_core::{CampaignStatus, DeliveryStatus};
use wavecast_storage::queries::{campaigns, contacts, deliveries};
use wavecast_storage::time::now_iso;
use wavecast_storage::{Campaign, CampaignStats, Contact, Database, Delivery};

pub async fn setup_db() -> (Database, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
    (db, dir)
}

pub async fn seed_contact(db: &Database, id: &str, phone: &str, tags: &[&str], active: bool) {
    contacts::insert_contact(
        db,
        &Contact {
            id: id.to_string(),
            name: format!("Contact {id}"),
            phone_number: phone.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_active: active,
            created_at: now_iso(),
            updated_at: now_iso(),
        },
    )
    .await
    .unwrap();
}

/// Create an in-progress campaign whose deliveries already sit at the given
/// statuses, with counters and timestamps consistent with those statuses.
pub async fn seed_campaign_with_deliveries(
    db: &Database,
    campaign_id: &str,
    specs: &[(&str, DeliveryStatus)],
) {
    let total = specs.len() as i64;
    campaigns::create_campaign(
        db,
        &Campaign {
            id: campaign_id.to_string(),
            name: format!("Campaign {campaign_id}"),
            description: None,
            template_name: "welcome".to_string(),
            template_language: "en".to_string(),
            target_tags: vec![],
            total_contacts: total,
            status: CampaignStatus::InProgress,
            scheduled_at: None,
            started_at: Some(now_iso()),
            completed_at: None,
            stats: CampaignStats {
                queued: total,
                ..Default::default()
            },
            created_at: now_iso(),
            updated_at: now_iso(),
        },
    )
    .await
    .unwrap();

    let rows: Vec<Delivery> = specs
        .iter()
        .map(|(id, _)| Delivery {
            id: id.to_string(),
            campaign_id: campaign_id.to_string(),
            contact_id: format!("contact-{id}"),
            phone_number: format!("1555{id}"),
            template_name: "welcome".to_string(),
            template_language: "en".to_string(),
            variables: vec![],
            provider_message_id: None,
            status: DeliveryStatus::Queued,
            error_code: None,
            error_message: None,
            sent_at: None,
            delivered_at: None,
            read_at: None,
            failed_at: None,
            created_at: now_iso(),
            updated_at: now_iso(),
        })
        .collect();
    deliveries::insert_deliveries(db, &rows).await.unwrap();

    for (id, status) in specs {
        if *status == DeliveryStatus::Queued {
            continue;
        }
        deliveries::record_transition(db, id, *status, None, None)
            .await
            .unwrap();
        assert!(
            campaigns::apply_stat_delta(db, campaign_id, DeliveryStatus::Queued, *status)
                .await
                .unwrap()
        );
    }
}
