// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recipient delivery records.
//!
//! Deliveries are the permanent audit trail of a campaign. Rows are never
//! deleted; status moves forward through the lifecycle and each landmark
//! status stamps its own timestamp column.

use rusqlite::params;
use wavecast_core::{DeliveryStatus, WavecastError};

use crate::database::Database;
use crate::models::Delivery;
use crate::queries::column_parse_err;

/// Filter for [`list_deliveries`]. All fields are optional and combine
/// conjunctively.
#[derive(Debug, Clone, Default)]
pub struct DeliveryFilter {
    pub campaign_id: Option<String>,
    pub status: Option<DeliveryStatus>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<String>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<String>,
}

/// Insert a batch of delivery rows in one transaction. Fan-out creates the
/// full recipient set before any job is enqueued, so a crash between the
/// two steps leaves auditable `queued` rows rather than orphan jobs.
pub async fn insert_deliveries(
    db: &Database,
    deliveries: &[Delivery],
) -> Result<(), WavecastError> {
    let deliveries = deliveries.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO deliveries
                     (id, campaign_id, contact_id, phone_number, template_name,
                      template_language, variables, provider_message_id, status,
                      error_code, error_message, sent_at, delivered_at, read_at,
                      failed_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                             ?13, ?14, ?15, ?16, ?17)",
                )?;
                for d in &deliveries {
                    let variables = serde_json::to_string(&d.variables)
                        .map_err(|e| column_parse_err(6, e))?;
                    stmt.execute(params![
                        d.id,
                        d.campaign_id,
                        d.contact_id,
                        d.phone_number,
                        d.template_name,
                        d.template_language,
                        variables,
                        d.provider_message_id,
                        d.status.to_string(),
                        d.error_code,
                        d.error_message,
                        d.sent_at,
                        d.delivered_at,
                        d.read_at,
                        d.failed_at,
                        d.created_at,
                        d.updated_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a delivery by id.
pub async fn get_delivery(db: &Database, id: &str) -> Result<Option<Delivery>, WavecastError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_DELIVERY} WHERE id = ?1"))?;
            let mut rows = stmt.query_map(params![id], map_delivery_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a delivery by the provider-assigned message id. This is the only
/// correlation key the status ingestor has.
pub async fn find_by_provider_message_id(
    db: &Database,
    provider_message_id: &str,
) -> Result<Option<Delivery>, WavecastError> {
    let pmid = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_DELIVERY} WHERE provider_message_id = ?1"))?;
            let mut rows = stmt.query_map(params![pmid], map_delivery_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Attach the provider message id after a successful send.
pub async fn record_provider_message_id(
    db: &Database,
    delivery_id: &str,
    provider_message_id: &str,
) -> Result<(), WavecastError> {
    let delivery_id = delivery_id.to_string();
    let pmid = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE deliveries
                 SET provider_message_id = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![delivery_id, pmid],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist a status transition, stamping the landmark timestamp column for
/// the new status. Error details are recorded only for `failed`.
pub async fn record_transition(
    db: &Database,
    delivery_id: &str,
    to: DeliveryStatus,
    error_code: Option<String>,
    error_message: Option<String>,
) -> Result<(), WavecastError> {
    let delivery_id = delivery_id.to_string();
    let stamp_col = match to {
        DeliveryStatus::Sent => Some("sent_at"),
        DeliveryStatus::Delivered => Some("delivered_at"),
        DeliveryStatus::Read => Some("read_at"),
        DeliveryStatus::Failed => Some("failed_at"),
        DeliveryStatus::Queued | DeliveryStatus::Sending => None,
    };
    db.connection()
        .call(move |conn| {
            let stamp = stamp_col
                .map(|col| format!(", {col} = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')"))
                .unwrap_or_default();
            conn.execute(
                &format!(
                    "UPDATE deliveries
                     SET status = ?2,
                         error_code = COALESCE(?3, error_code),
                         error_message = COALESCE(?4, error_message),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'){stamp}
                     WHERE id = ?1"
                ),
                params![delivery_id, to.to_string(), error_code, error_message],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist `sending -> sent` only while the record is still `sending`.
///
/// The worker calls this after a successful send. A status callback can
/// land in the window between the provider-id write and this one; the
/// guard keeps that later status from being overwritten. Returns whether
/// the row changed, so the caller applies the counter delta only when the
/// transition actually happened.
pub async fn mark_sent_if_sending(
    db: &Database,
    delivery_id: &str,
) -> Result<bool, WavecastError> {
    let delivery_id = delivery_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE deliveries
                 SET status = 'sent',
                     sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'sending'",
                params![delivery_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the error of a non-final send attempt without changing status.
/// The delivery stays `sending` while the job waits for its retry.
pub async fn record_send_error(
    db: &Database,
    delivery_id: &str,
    error_code: &str,
    error_message: &str,
) -> Result<(), WavecastError> {
    let delivery_id = delivery_id.to_string();
    let error_code = error_code.to_string();
    let error_message = error_message.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE deliveries
                 SET error_code = ?2,
                     error_message = ?3,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![delivery_id, error_code, error_message],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List deliveries newest-first, filtered and paginated. Returns the page
/// and the count matching the filter.
pub async fn list_deliveries(
    db: &Database,
    filter: &DeliveryFilter,
    page: i64,
    limit: i64,
) -> Result<(Vec<Delivery>, i64), WavecastError> {
    let filter = filter.clone();
    let offset = (page.max(1) - 1) * limit;
    db.connection()
        .call(move |conn| {
            let mut clauses = Vec::new();
            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            if let Some(campaign_id) = &filter.campaign_id {
                args.push(Box::new(campaign_id.clone()));
                clauses.push(format!("campaign_id = ?{}", args.len()));
            }
            if let Some(status) = filter.status {
                args.push(Box::new(status.to_string()));
                clauses.push(format!("status = ?{}", args.len()));
            }
            if let Some(from) = &filter.from {
                args.push(Box::new(from.clone()));
                clauses.push(format!("created_at >= ?{}", args.len()));
            }
            if let Some(to) = &filter.to {
                args.push(Box::new(to.clone()));
                clauses.push(format!("created_at <= ?{}", args.len()));
            }
            let where_clause = if clauses.is_empty() {
                String::new()
            } else {
                format!(" WHERE {}", clauses.join(" AND "))
            };

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM deliveries{where_clause}"),
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                |row| row.get(0),
            )?;

            args.push(Box::new(limit));
            let limit_idx = args.len();
            args.push(Box::new(offset));
            let offset_idx = args.len();
            let mut stmt = conn.prepare(&format!(
                "{SELECT_DELIVERY}{where_clause}
                 ORDER BY created_at DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                map_delivery_row,
            )?;
            let mut deliveries = Vec::new();
            for row in rows {
                deliveries.push(row?);
            }
            Ok((deliveries, total))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Failed deliveries for a campaign, oldest failure first, capped.
pub async fn list_failed_for_campaign(
    db: &Database,
    campaign_id: &str,
    limit: i64,
) -> Result<Vec<Delivery>, WavecastError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_DELIVERY} WHERE campaign_id = ?1 AND status = 'failed'
                 ORDER BY failed_at ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![campaign_id, limit], map_delivery_row)?;
            let mut deliveries = Vec::new();
            for row in rows {
                deliveries.push(row?);
            }
            Ok(deliveries)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

const SELECT_DELIVERY: &str = "SELECT id, campaign_id, contact_id, phone_number, template_name,
        template_language, variables, provider_message_id, status, error_code,
        error_message, sent_at, delivered_at, read_at, failed_at, created_at, updated_at
 FROM deliveries";

fn map_delivery_row(row: &rusqlite::Row<'_>) -> Result<Delivery, rusqlite::Error> {
    let variables_json: String = row.get(6)?;
    let variables = serde_json::from_str(&variables_json).map_err(|e| column_parse_err(6, e))?;
    let status_str: String = row.get(8)?;
    let status: DeliveryStatus = status_str.parse().map_err(|e| column_parse_err(8, e))?;
    Ok(Delivery {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        contact_id: row.get(2)?,
        phone_number: row.get(3)?,
        template_name: row.get(4)?,
        template_language: row.get(5)?,
        variables,
        provider_message_id: row.get(7)?,
        status,
        error_code: row.get(9)?,
        error_message: row.get(10)?,
        sent_at: row.get(11)?,
        delivered_at: row.get(12)?,
        read_at: row.get(13)?,
        failed_at: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}
