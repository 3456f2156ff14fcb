// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign fan-out: one request becomes a campaign aggregate, N delivery
//! records, and N staggered dispatch jobs.
//!
//! Effect order is fixed: campaign row, then every delivery row, then the
//! job batch. A crash between the steps leaves auditable `queued` records,
//! never a job whose delivery does not exist.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use wavecast_config::QueueConfig;
use wavecast_core::{CampaignStatus, DeliveryStatus, WavecastError};
use wavecast_storage::queries::queue::EnqueueJob;
use wavecast_storage::queries::{campaigns, contacts, queue};
use wavecast_storage::time::now_iso;
use wavecast_storage::{Campaign, CampaignStats, Contact, Database, Delivery, SendPayload};

use crate::QUEUE_NAME;

/// A bulk-send request as accepted by the HTTP surface.
#[derive(Debug, Clone, Deserialize)]
pub struct FanOutRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub template_name: String,
    #[serde(default = "default_language")]
    pub template_language: String,
    /// Empty means "all active contacts".
    #[serde(default)]
    pub target_tags: Vec<String>,
    /// Body variables applied to every recipient's template.
    #[serde(default)]
    pub variables: Vec<String>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Validate, resolve recipients, and create the campaign with its delivery
/// records and dispatch jobs. Returns the created campaign and the
/// recipient count. On validation failure nothing is created.
pub async fn fan_out(
    db: &Database,
    config: &QueueConfig,
    request: FanOutRequest,
) -> Result<(Campaign, usize), WavecastError> {
    if request.name.trim().is_empty() {
        return Err(WavecastError::Validation(
            "campaign name must not be empty".to_string(),
        ));
    }
    if request.template_name.trim().is_empty() {
        return Err(WavecastError::Validation(
            "template name must not be empty".to_string(),
        ));
    }

    let recipients = contacts::list_active_contacts(db, &request.target_tags).await?;
    if recipients.is_empty() {
        return Err(WavecastError::Validation(
            "no active contacts match the targeting".to_string(),
        ));
    }
    let total = recipients.len();

    let campaign = Campaign {
        id: Uuid::new_v4().to_string(),
        name: request.name,
        description: request.description,
        template_name: request.template_name,
        template_language: request.template_language,
        target_tags: request.target_tags,
        total_contacts: total as i64,
        status: CampaignStatus::InProgress,
        scheduled_at: None,
        started_at: Some(now_iso()),
        completed_at: None,
        stats: CampaignStats {
            queued: total as i64,
            ..Default::default()
        },
        created_at: now_iso(),
        updated_at: now_iso(),
    };
    campaigns::create_campaign(db, &campaign).await?;

    let deliveries: Vec<Delivery> = recipients
        .iter()
        .map(|contact| make_delivery(&campaign, contact, &request.variables))
        .collect();
    wavecast_storage::queries::deliveries::insert_deliveries(db, &deliveries).await?;

    let jobs: Vec<EnqueueJob> = deliveries
        .iter()
        .enumerate()
        .map(|(index, delivery)| {
            let payload = SendPayload {
                delivery_id: delivery.id.clone(),
                campaign_id: campaign.id.clone(),
                phone_number: delivery.phone_number.clone(),
                template_name: delivery.template_name.clone(),
                language_code: delivery.template_language.clone(),
                variables: delivery.variables.clone(),
            };
            Ok(EnqueueJob {
                delivery_id: delivery.id.clone(),
                payload: serde_json::to_string(&payload)
                    .map_err(|e| WavecastError::Internal(format!("payload encoding: {e}")))?,
                delay_ms: config.message_delay_ms * index as u64,
            })
        })
        .collect::<Result<_, WavecastError>>()?;
    queue::enqueue_batch(db, QUEUE_NAME, jobs, config.max_attempts).await?;

    info!(
        campaign_id = %campaign.id,
        recipients = total,
        stagger_ms = config.message_delay_ms,
        "campaign fan-out complete"
    );
    Ok((campaign, total))
}

fn make_delivery(campaign: &Campaign, contact: &Contact, variables: &[String]) -> Delivery {
    Delivery {
        id: Uuid::new_v4().to_string(),
        campaign_id: campaign.id.clone(),
        contact_id: contact.id.clone(),
        phone_number: contact.phone_number.clone(),
        template_name: campaign.template_name.clone(),
        template_language: campaign.template_language.clone(),
        variables: variables.to_vec(),
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
    }
}
