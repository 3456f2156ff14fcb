// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable dispatch queue operations.
//!
//! Jobs survive process restarts and move through
//! waiting -> active -> completed | failed. Delayed admission and retry
//! backoff both ride on `available_at`: a waiting job whose timestamp lies
//! in the future is simply not due yet.

use rusqlite::params;
use wavecast_core::WavecastError;

use crate::database::Database;
use crate::models::{DispatchJob, QueueStats};
use crate::time::iso_in_ms;

/// Name of the outbound dispatch queue.
pub const QUEUE_NAME: &str = "whatsapp-messages";

/// Outcome of [`fail_with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// The job went back to waiting with a backoff delay.
    Retry { attempts: i64, delay_ms: u64 },
    /// The job burned its last attempt and is now permanently failed.
    Exhausted,
}

/// One job to enqueue: the delivery it serves, its serialized payload, and
/// its admission delay relative to now.
#[derive(Debug, Clone)]
pub struct EnqueueJob {
    pub delivery_id: String,
    pub payload: String,
    pub delay_ms: u64,
}

/// Exponential backoff delay for a retry: `base * 2^(attempts-1)`, so the
/// first retry waits the base delay and each one after doubles.
pub fn backoff_delay_ms(base_ms: u64, attempts: i64) -> u64 {
    base_ms << (attempts - 1).clamp(0, 32)
}

/// Enqueue a batch of jobs in one transaction. Either every recipient gets
/// a job or none do; a crash mid-fan-out never leaves a partial batch.
pub async fn enqueue_batch(
    db: &Database,
    queue_name: &str,
    jobs: Vec<EnqueueJob>,
    max_attempts: u32,
) -> Result<(), WavecastError> {
    let queue_name = queue_name.to_string();
    // Admission timestamps are computed up front so the whole batch shares
    // one "now".
    let rows: Vec<(String, String, String)> = jobs
        .into_iter()
        .map(|j| (j.delivery_id, j.payload, iso_in_ms(j.delay_ms)))
        .collect();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO dispatch_jobs
                     (queue_name, delivery_id, payload, max_attempts, available_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (delivery_id, payload, available_at) in &rows {
                    stmt.execute(params![
                        queue_name,
                        delivery_id,
                        payload,
                        max_attempts,
                        available_at
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next due job from the named queue.
///
/// Atomically selects the oldest waiting job whose `available_at` has
/// passed and marks it active. Returns `None` when nothing is due.
pub async fn dequeue_due(
    db: &Database,
    queue_name: &str,
) -> Result<Option<DispatchJob>, WavecastError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(
                    "SELECT id, queue_name, delivery_id, payload, status, attempts,
                            max_attempts, available_at, created_at, updated_at
                     FROM dispatch_jobs
                     WHERE queue_name = ?1 AND status = 'waiting'
                       AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     ORDER BY available_at ASC, id ASC
                     LIMIT 1",
                )?;
                stmt.query_row(params![queue_name], map_job_row)
            };

            match result {
                Ok(job) => {
                    tx.execute(
                        "UPDATE dispatch_jobs SET status = 'active',
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![job.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(DispatchJob {
                        status: "active".to_string(),
                        ..job
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful processing: marks the job completed.
pub async fn complete(db: &Database, id: i64) -> Result<(), WavecastError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE dispatch_jobs SET status = 'completed',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed attempt.
///
/// Increments attempts. Below the attempt cap the job returns to waiting
/// with an exponential backoff on `available_at`; at the cap it becomes
/// permanently failed.
pub async fn fail_with_backoff(
    db: &Database,
    id: i64,
    backoff_base_ms: u64,
) -> Result<FailOutcome, WavecastError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM dispatch_jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            if new_attempts >= max_attempts {
                conn.execute(
                    "UPDATE dispatch_jobs SET status = 'failed', attempts = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?2",
                    params![new_attempts, id],
                )?;
                Ok(FailOutcome::Exhausted)
            } else {
                let delay_ms = backoff_delay_ms(backoff_base_ms, new_attempts);
                conn.execute(
                    "UPDATE dispatch_jobs SET status = 'waiting', attempts = ?1,
                     available_at = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?3",
                    params![new_attempts, iso_in_ms(delay_ms), id],
                )?;
                Ok(FailOutcome::Retry {
                    attempts: new_attempts,
                    delay_ms,
                })
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fail a job outright, skipping remaining retries. Used when the job can
/// never succeed, e.g. its delivery record is gone.
pub async fn fail_permanently(db: &Database, id: i64) -> Result<(), WavecastError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE dispatch_jobs SET status = 'failed',
                 attempts = max_attempts,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Queue observability counters for the named queue.
///
/// `waiting` counts only due jobs; waiting jobs scheduled in the future
/// report as `delayed`.
pub async fn stats(db: &Database, queue_name: &str) -> Result<QueueStats, WavecastError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT
                   COUNT(*) FILTER (WHERE status = 'waiting'
                     AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                   COUNT(*) FILTER (WHERE status = 'active'),
                   COUNT(*) FILTER (WHERE status = 'completed'),
                   COUNT(*) FILTER (WHERE status = 'failed'),
                   COUNT(*) FILTER (WHERE status = 'waiting'
                     AND available_at > strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 FROM dispatch_jobs WHERE queue_name = ?1",
                params![queue_name],
                |row| {
                    Ok(QueueStats {
                        waiting: row.get(0)?,
                        active: row.get(1)?,
                        completed: row.get(2)?,
                        failed: row.get(3)?,
                        delayed: row.get(4)?,
                    })
                },
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Prune finished jobs so the queue table stays bounded.
///
/// Keeps the newest `keep_completed` completed jobs, drops completed jobs
/// older than `completed_max_age_hours` regardless, and keeps the newest
/// `keep_failed` failed jobs. Delivery records are untouched; they are the
/// audit trail, the queue is not.
pub async fn prune(
    db: &Database,
    queue_name: &str,
    keep_completed: u32,
    completed_max_age_hours: u32,
    keep_failed: u32,
) -> Result<usize, WavecastError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let mut removed = 0;
            removed += conn.execute(
                "DELETE FROM dispatch_jobs
                 WHERE queue_name = ?1 AND status = 'completed'
                   AND id NOT IN (
                     SELECT id FROM dispatch_jobs
                     WHERE queue_name = ?1 AND status = 'completed'
                     ORDER BY id DESC LIMIT ?2
                   )",
                params![queue_name, keep_completed],
            )?;
            removed += conn.execute(
                "DELETE FROM dispatch_jobs
                 WHERE queue_name = ?1 AND status = 'completed'
                   AND updated_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now',
                                             '-' || ?2 || ' hours')",
                params![queue_name, completed_max_age_hours],
            )?;
            removed += conn.execute(
                "DELETE FROM dispatch_jobs
                 WHERE queue_name = ?1 AND status = 'failed'
                   AND id NOT IN (
                     SELECT id FROM dispatch_jobs
                     WHERE queue_name = ?1 AND status = 'failed'
                     ORDER BY id DESC LIMIT ?2
                   )",
                params![queue_name, keep_failed],
            )?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn map_job_row(row: &rusqlite::Row<'_>) -> Result<DispatchJob, rusqlite::Error> {
    Ok(DispatchJob {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        delivery_id: row.get(2)?,
        payload: row.get(3)?,
        status: row.get(4)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        available_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
