// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign operations, including the atomic counter deltas shared by the
//! delivery worker and the status ingestor.
//!
//! Counters are NEVER updated by reading the whole aggregate, mutating it in
//! memory and writing it back: two independent writers race on the same row,
//! and a load-mutate-save loses updates. Every mutation is a single keyed
//! `SET stat_x = stat_x - 1, stat_y = stat_y + 1` statement.

use rusqlite::params;
use wavecast_core::{CampaignStatus, DeliveryStatus, WavecastError};

use crate::database::Database;
use crate::models::{Campaign, CampaignStats};
use crate::queries::column_parse_err;

/// The counter column backing a delivery status.
fn stat_column(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Queued => "stat_queued",
        DeliveryStatus::Sending => "stat_sending",
        DeliveryStatus::Sent => "stat_sent",
        DeliveryStatus::Delivered => "stat_delivered",
        DeliveryStatus::Read => "stat_read",
        DeliveryStatus::Failed => "stat_failed",
    }
}

/// Insert a new campaign row.
pub async fn create_campaign(db: &Database, campaign: &Campaign) -> Result<(), WavecastError> {
    let campaign = campaign.clone();
    db.connection()
        .call(move |conn| {
            let target_tags = serde_json::to_string(&campaign.target_tags)
                .map_err(|e| column_parse_err(5, e))?;
            conn.execute(
                "INSERT INTO campaigns
                 (id, name, description, template_name, template_language, target_tags,
                  total_contacts, status, scheduled_at, started_at, completed_at,
                  stat_queued, stat_sending, stat_sent, stat_delivered, stat_read, stat_failed,
                  created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                         ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                params![
                    campaign.id,
                    campaign.name,
                    campaign.description,
                    campaign.template_name,
                    campaign.template_language,
                    target_tags,
                    campaign.total_contacts,
                    campaign.status.to_string(),
                    campaign.scheduled_at,
                    campaign.started_at,
                    campaign.completed_at,
                    campaign.stats.queued,
                    campaign.stats.sending,
                    campaign.stats.sent,
                    campaign.stats.delivered,
                    campaign.stats.read,
                    campaign.stats.failed,
                    campaign.created_at,
                    campaign.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a campaign by id.
pub async fn get_campaign(db: &Database, id: &str) -> Result<Option<Campaign>, WavecastError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_CAMPAIGN} WHERE id = ?1"))?;
            let mut rows = stmt.query_map(params![id], map_campaign_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List campaigns newest-first with offset pagination. Returns the page and
/// the overall count.
pub async fn list_campaigns(
    db: &Database,
    page: i64,
    limit: i64,
) -> Result<(Vec<Campaign>, i64), WavecastError> {
    let offset = (page.max(1) - 1) * limit;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_CAMPAIGN} ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![limit, offset], map_campaign_row)?;
            let mut campaigns = Vec::new();
            for row in rows {
                campaigns.push(row?);
            }
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM campaigns", [], |row| row.get(0))?;
            Ok((campaigns, total))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Atomically move one unit of the aggregate from the `from` counter to the
/// `to` counter.
///
/// This is the single cross-path coordination point between the worker and
/// the ingestor. The `from > 0` guard keeps a reconciliation bug from
/// driving a counter negative; a skipped delta is reported as `false` so
/// callers can log it.
pub async fn apply_stat_delta(
    db: &Database,
    campaign_id: &str,
    from: DeliveryStatus,
    to: DeliveryStatus,
) -> Result<bool, WavecastError> {
    let campaign_id = campaign_id.to_string();
    let from_col = stat_column(from);
    let to_col = stat_column(to);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE campaigns
                     SET {from_col} = {from_col} - 1,
                         {to_col} = {to_col} + 1,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1 AND {from_col} > 0"
                ),
                params![campaign_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Lazily infer campaign completion on read.
///
/// A single guarded UPDATE: flips `in_progress` to `completed` (stamping
/// `completed_at`) only when no delivery remains queued or sending. Two
/// concurrent readers cannot double-transition, and a completed campaign is
/// never resurrected. Returns whether the transition happened.
pub async fn mark_completed_if_settled(
    db: &Database,
    campaign_id: &str,
) -> Result<bool, WavecastError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE campaigns
                 SET status = 'completed',
                     completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'in_progress'
                   AND stat_queued = 0 AND stat_sending = 0",
                params![campaign_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

const SELECT_CAMPAIGN: &str = "SELECT id, name, description, template_name, template_language,
        target_tags, total_contacts, status, scheduled_at, started_at, completed_at,
        stat_queued, stat_sending, stat_sent, stat_delivered, stat_read, stat_failed,
        created_at, updated_at
 FROM campaigns";

fn map_campaign_row(row: &rusqlite::Row<'_>) -> Result<Campaign, rusqlite::Error> {
    let target_tags_json: String = row.get(5)?;
    let target_tags =
        serde_json::from_str(&target_tags_json).map_err(|e| column_parse_err(5, e))?;
    let status_str: String = row.get(7)?;
    let status: CampaignStatus = status_str.parse().map_err(|e| column_parse_err(7, e))?;
    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        template_name: row.get(3)?,
        template_language: row.get(4)?,
        target_tags,
        total_contacts: row.get(6)?,
        status,
        scheduled_at: row.get(8)?,
        started_at: row.get(9)?,
        completed_at: row.get(10)?,
        stats: CampaignStats {
            queued: row.get(11)?,
            sending: row.get(12)?,
            sent: row.get(13)?,
            delivered: row.get(14)?,
            read: row.get(15)?,
            failed: row.get(16)?,
        },
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::time::now_iso;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    pub(crate) fn make_campaign(id: &str, total: i64) -> Campaign {
        Campaign {
            id: id.to_string(),
            name: format!("Campaign {id}"),
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
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let (db, _dir) = setup_db().await;

        create_campaign(&db, &make_campaign("camp-1", 3)).await.unwrap();

        let fetched = get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Campaign camp-1");
        assert_eq!(fetched.total_contacts, 3);
        assert_eq!(fetched.status, CampaignStatus::InProgress);
        assert_eq!(fetched.stats.queued, 3);
        assert_eq!(fetched.stats.total(), 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stat_delta_moves_one_unit_and_preserves_sum() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("camp-1", 3)).await.unwrap();

        let applied =
            apply_stat_delta(&db, "camp-1", DeliveryStatus::Queued, DeliveryStatus::Sending)
                .await
                .unwrap();
        assert!(applied);

        let campaign = get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!(campaign.stats.queued, 2);
        assert_eq!(campaign.stats.sending, 1);
        assert_eq!(campaign.stats.total(), campaign.total_contacts);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stat_delta_refuses_to_go_negative() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("camp-1", 1)).await.unwrap();

        // `sent` is zero; moving out of it must be skipped, not applied.
        let applied =
            apply_stat_delta(&db, "camp-1", DeliveryStatus::Sent, DeliveryStatus::Delivered)
                .await
                .unwrap();
        assert!(!applied);

        let campaign = get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!(campaign.stats.total(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_deltas_lose_no_updates() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("camp-1", 50)).await.unwrap();

        // 50 concurrent queued -> sending deltas, as if the worker and the
        // ingestor were hammering the same aggregate.
        let db = std::sync::Arc::new(db);
        let mut handles = Vec::new();
        for _ in 0..50 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                apply_stat_delta(&db, "camp-1", DeliveryStatus::Queued, DeliveryStatus::Sending)
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        let campaign = get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!(campaign.stats.queued, 0);
        assert_eq!(campaign.stats.sending, 50);
        assert_eq!(campaign.stats.total(), 50);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn completion_waits_for_queued_and_sending_to_drain() {
        let (db, _dir) = setup_db().await;
        create_campaign(&db, &make_campaign("camp-1", 1)).await.unwrap();

        // Still queued: no completion.
        assert!(!mark_completed_if_settled(&db, "camp-1").await.unwrap());

        apply_stat_delta(&db, "camp-1", DeliveryStatus::Queued, DeliveryStatus::Sending)
            .await
            .unwrap();
        assert!(!mark_completed_if_settled(&db, "camp-1").await.unwrap());

        apply_stat_delta(&db, "camp-1", DeliveryStatus::Sending, DeliveryStatus::Sent)
            .await
            .unwrap();
        assert!(mark_completed_if_settled(&db, "camp-1").await.unwrap());

        let campaign = get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Completed);
        assert!(campaign.completed_at.is_some());

        // Second read is a no-op, not a re-transition.
        assert!(!mark_completed_if_settled(&db, "camp-1").await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_paginates_newest_first() {
        let (db, _dir) = setup_db().await;
        for i in 0..5 {
            let mut campaign = make_campaign(&format!("camp-{i}"), 1);
            campaign.created_at = format!("2026-01-01T00:00:0{i}.000Z");
            create_campaign(&db, &campaign).await.unwrap();
        }

        let (page, total) = list_campaigns(&db, 1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "camp-4");
        assert_eq!(page[1].id, "camp-3");

        let (page2, _) = list_campaigns(&db, 2, 2).await.unwrap();
        assert_eq!(page2[0].id, "camp-2");

        db.close().await.unwrap();
    }
}
