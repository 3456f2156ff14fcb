// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign read surface: detail reads (which trigger completion
//! inference), listing, and analytics.

use serde::Serialize;
use tracing::info;
use wavecast_core::WavecastError;
use wavecast_storage::queries::{campaigns, deliveries};
use wavecast_storage::{Campaign, Database, Delivery};

/// Recent deliveries included with a campaign detail read.
const RECENT_DELIVERIES: i64 = 10;

/// Failed deliveries included with the analytics view.
const FAILED_SAMPLE: i64 = 50;

/// A campaign with its most recent deliveries.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub recent_deliveries: Vec<Delivery>,
}

/// Aggregate outcome rates for a campaign.
///
/// Counters are exclusive (a `read` delivery no longer counts as
/// `delivered`), so the cumulative rates sum the tail of the chain.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignAnalytics {
    pub campaign_id: String,
    pub total_contacts: i64,
    /// Fraction of recipients whose message reached the device
    /// (delivered or read).
    pub delivery_rate: f64,
    /// Fraction of recipients who read the message.
    pub read_rate: f64,
    /// Fraction of recipients whose delivery permanently failed.
    pub failure_rate: f64,
    pub failed_deliveries: Vec<Delivery>,
}

/// Read one campaign, inferring completion first.
pub async fn read_campaign(
    db: &Database,
    campaign_id: &str,
) -> Result<Option<CampaignDetail>, WavecastError> {
    if campaigns::mark_completed_if_settled(db, campaign_id).await? {
        info!(campaign_id, "campaign settled, marked completed");
    }
    let Some(campaign) = campaigns::get_campaign(db, campaign_id).await? else {
        return Ok(None);
    };
    let filter = deliveries::DeliveryFilter {
        campaign_id: Some(campaign_id.to_string()),
        ..Default::default()
    };
    let (recent, _) = deliveries::list_deliveries(db, &filter, 1, RECENT_DELIVERIES).await?;
    Ok(Some(CampaignDetail {
        campaign,
        recent_deliveries: recent,
    }))
}

/// List campaigns newest-first. Returns the page and the overall count.
pub async fn list_campaigns(
    db: &Database,
    page: i64,
    limit: i64,
) -> Result<(Vec<Campaign>, i64), WavecastError> {
    campaigns::list_campaigns(db, page, limit).await
}

/// Outcome rates plus a sample of failed deliveries.
pub async fn campaign_analytics(
    db: &Database,
    campaign_id: &str,
) -> Result<Option<CampaignAnalytics>, WavecastError> {
    if campaigns::mark_completed_if_settled(db, campaign_id).await? {
        info!(campaign_id, "campaign settled, marked completed");
    }
    let Some(campaign) = campaigns::get_campaign(db, campaign_id).await? else {
        return Ok(None);
    };

    let total = campaign.total_contacts;
    let rate = |n: i64| {
        if total > 0 {
            n as f64 / total as f64
        } else {
            0.0
        }
    };
    let stats = campaign.stats;
    let failed_deliveries =
        deliveries::list_failed_for_campaign(db, campaign_id, FAILED_SAMPLE).await?;

    Ok(Some(CampaignAnalytics {
        campaign_id: campaign.id,
        total_contacts: total,
        delivery_rate: rate(stats.delivered + stats.read),
        read_rate: rate(stats.read),
        failure_rate: rate(stats.failed),
        failed_deliveries,
    }))
}
