// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.

use serde::{Deserialize, Serialize};
use wavecast_core::{CampaignStatus, DeliveryStatus};

/// A contact reachable by the fan-out coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    /// Normalized phone identifier: digits only, country code included.
    pub phone_number: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Rolled-up per-status counters attached to a campaign.
///
/// Maintained incrementally via atomic keyed deltas, never recomputed
/// wholesale. Invariant: [`CampaignStats::total`] equals the campaign's
/// immutable `total_contacts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub queued: i64,
    pub sending: i64,
    pub sent: i64,
    pub delivered: i64,
    pub read: i64,
    pub failed: i64,
}

impl CampaignStats {
    /// Sum of all counters.
    pub fn total(&self) -> i64 {
        self.queued + self.sending + self.sent + self.delivered + self.read + self.failed
    }

    /// Counter value for a given delivery status.
    pub fn get(&self, status: DeliveryStatus) -> i64 {
        match status {
            DeliveryStatus::Queued => self.queued,
            DeliveryStatus::Sending => self.sending,
            DeliveryStatus::Sent => self.sent,
            DeliveryStatus::Delivered => self.delivered,
            DeliveryStatus::Read => self.read,
            DeliveryStatus::Failed => self.failed,
        }
    }
}

/// A bulk-send campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub template_name: String,
    pub template_language: String,
    pub target_tags: Vec<String>,
    /// Recipient count at creation time; immutable once set.
    pub total_contacts: i64,
    pub status: CampaignStatus,
    pub scheduled_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub stats: CampaignStats,
    pub created_at: String,
    pub updated_at: String,
}

/// The durable, append-only-status record of one attempted message to one
/// recipient. Never deleted; it is the permanent audit trail for a send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: String,
    pub campaign_id: String,
    pub contact_id: String,
    pub phone_number: String,
    pub template_name: String,
    pub template_language: String,
    pub variables: Vec<String>,
    /// Assigned only after a successful send.
    pub provider_message_id: Option<String>,
    pub status: DeliveryStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: Option<String>,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
    pub failed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Denormalized send payload carried by a dispatch job, so the worker can
/// send without re-reading the delivery record first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendPayload {
    pub delivery_id: String,
    pub campaign_id: String,
    pub phone_number: String,
    pub template_name: String,
    pub language_code: String,
    pub variables: Vec<String>,
}

/// One row of the durable dispatch queue.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub id: i64,
    pub queue_name: String,
    pub delivery_id: String,
    pub payload: String,
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub available_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl DispatchJob {
    /// Deserialize the denormalized send payload.
    pub fn send_payload(&self) -> Result<SendPayload, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// Queue observability counters, summable into a total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub delayed: i64,
}

impl QueueStats {
    pub fn total(&self) -> i64 {
        self.waiting + self.active + self.completed + self.failed + self.delayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_total_sums_all_counters() {
        let stats = CampaignStats {
            queued: 1,
            sending: 2,
            sent: 3,
            delivered: 4,
            read: 5,
            failed: 6,
        };
        assert_eq!(stats.total(), 21);
        assert_eq!(stats.get(DeliveryStatus::Delivered), 4);
    }

    #[test]
    fn send_payload_round_trips_through_job_json() {
        let payload = SendPayload {
            delivery_id: "d-1".into(),
            campaign_id: "c-1".into(),
            phone_number: "15551234567".into(),
            template_name: "welcome".into(),
            language_code: "en".into(),
            variables: vec!["Ada".into()],
        };
        let json = serde_json::to_string(&payload).unwrap();
        let job = DispatchJob {
            id: 1,
            queue_name: "whatsapp-messages".into(),
            delivery_id: "d-1".into(),
            payload: json,
            status: "waiting".into(),
            attempts: 0,
            max_attempts: 3,
            available_at: "2026-01-01T00:00:00.000Z".into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let parsed = job.send_payload().unwrap();
        assert_eq!(parsed.phone_number, "15551234567");
        assert_eq!(parsed.variables, vec!["Ada".to_string()]);
    }
}
