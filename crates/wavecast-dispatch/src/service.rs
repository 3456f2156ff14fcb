// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The delivery worker: drains the dispatch queue one job at a time.
//!
//! Single consumer per process. Each tick admits at most one due job
//! through the rate limiter, sends it through the gateway, and reconciles
//! the delivery record and campaign counters with the outcome. A delivery
//! is marked `failed` only when its job burns the last attempt; earlier
//! attempt errors are recorded on the delivery without a status change.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wavecast_config::QueueConfig;
use wavecast_core::{advance, DeliveryStatus, MessagingGateway, Transition, WavecastError};
use wavecast_storage::queries::queue::FailOutcome;
use wavecast_storage::queries::{campaigns, deliveries, queue};
use wavecast_storage::{Database, DispatchJob, QueueStats, SendPayload};

use crate::limiter::RateLimiter;

pub use wavecast_storage::queries::queue::QUEUE_NAME;

/// What one worker tick did, and how long to idle before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing due.
    Idle,
    /// A job is due but the rate budget is spent; retry after the wait.
    Throttled(Duration),
    /// One job was processed (successfully or not).
    Processed,
}

/// The dispatch worker.
pub struct DispatchService {
    db: Arc<Database>,
    gateway: Arc<dyn MessagingGateway>,
    config: QueueConfig,
    limiter: Mutex<RateLimiter>,
}

impl DispatchService {
    pub fn new(db: Arc<Database>, gateway: Arc<dyn MessagingGateway>, config: QueueConfig) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        Self {
            db,
            gateway,
            config,
            limiter: Mutex::new(limiter),
        }
    }

    /// Queue observability counters.
    pub async fn stats(&self) -> Result<QueueStats, WavecastError> {
        queue::stats(&self.db, QUEUE_NAME).await
    }

    /// One worker tick: admit at most one due job through the limiter and
    /// process it end to end.
    pub async fn run_once(&self) -> Result<Tick, WavecastError> {
        if let Some(wait) = self
            .limiter
            .lock()
            .expect("limiter lock poisoned")
            .check(Instant::now())
        {
            return Ok(Tick::Throttled(wait));
        }

        let Some(job) = queue::dequeue_due(&self.db, QUEUE_NAME).await? else {
            return Ok(Tick::Idle);
        };

        self.limiter
            .lock()
            .expect("limiter lock poisoned")
            .record(Instant::now());

        self.process_job(job).await?;
        Ok(Tick::Processed)
    }

    /// Spawn the worker loop. The returned handle stops it gracefully.
    pub fn start(self: &Arc<Self>) -> DispatchHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!(queue = QUEUE_NAME, "dispatch worker started");
            loop {
                let poll = Duration::from_millis(service.config.poll_interval_ms);
                let sleep_for = match service.run_once().await {
                    Ok(Tick::Processed) => Duration::ZERO,
                    Ok(Tick::Idle) => poll,
                    Ok(Tick::Throttled(wait)) => wait.min(poll),
                    Err(e) => {
                        error!(error = %e, "dispatch tick failed");
                        poll
                    }
                };
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {}
                    _ = shutdown_rx.changed() => {
                        info!("dispatch worker stopping");
                        break;
                    }
                }
            }
        });
        DispatchHandle {
            shutdown_tx,
            handle,
        }
    }

    async fn process_job(&self, job: DispatchJob) -> Result<(), WavecastError> {
        let payload: SendPayload = match job.send_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(job_id = job.id, error = %e, "malformed job payload, failing permanently");
                return queue::fail_permanently(&self.db, job.id).await;
            }
        };

        let Some(delivery) = deliveries::get_delivery(&self.db, &payload.delivery_id).await? else {
            warn!(
                job_id = job.id,
                delivery_id = %payload.delivery_id,
                "delivery record missing, failing job permanently"
            );
            return queue::fail_permanently(&self.db, job.id).await;
        };

        // First attempt moves queued -> sending; a retry finds the record
        // already sending and does nothing.
        match advance(delivery.status, DeliveryStatus::Sending) {
            Transition::Apply(_) => {
                deliveries::record_transition(
                    &self.db,
                    &delivery.id,
                    DeliveryStatus::Sending,
                    None,
                    None,
                )
                .await?;
                if !campaigns::apply_stat_delta(
                    &self.db,
                    &payload.campaign_id,
                    delivery.status,
                    DeliveryStatus::Sending,
                )
                .await?
                {
                    warn!(
                        campaign_id = %payload.campaign_id,
                        from = %delivery.status,
                        "stat delta skipped, counter already empty"
                    );
                }
            }
            Transition::Noop => {}
            Transition::Rejected => {
                // The delivery moved past sending without us, e.g. it was
                // reconciled failed while the job sat in backoff. Stale job.
                debug!(
                    job_id = job.id,
                    delivery_id = %delivery.id,
                    status = %delivery.status,
                    "delivery no longer sendable, completing stale job"
                );
                return queue::complete(&self.db, job.id).await;
            }
        }

        match self
            .gateway
            .send_template(
                &payload.phone_number,
                &payload.template_name,
                &payload.language_code,
                &payload.variables,
            )
            .await
        {
            Ok(provider_id) => {
                deliveries::record_provider_message_id(&self.db, &delivery.id, &provider_id.0)
                    .await?;
                // A callback can land between the provider-id write and this
                // one; the guard keeps the record at the later status and the
                // delta stays paired with a write that actually happened.
                if deliveries::mark_sent_if_sending(&self.db, &delivery.id).await? {
                    if !campaigns::apply_stat_delta(
                        &self.db,
                        &payload.campaign_id,
                        DeliveryStatus::Sending,
                        DeliveryStatus::Sent,
                    )
                    .await?
                    {
                        warn!(
                            campaign_id = %payload.campaign_id,
                            "stat delta skipped, counter already empty"
                        );
                    }
                } else {
                    debug!(
                        delivery_id = %delivery.id,
                        "record already advanced past sending, sent write skipped"
                    );
                }
                queue::complete(&self.db, job.id).await?;
                queue::prune(
                    &self.db,
                    QUEUE_NAME,
                    self.config.keep_completed,
                    self.config.completed_max_age_hours,
                    self.config.keep_failed,
                )
                .await?;
                info!(
                    delivery_id = %delivery.id,
                    provider_message_id = %provider_id.0,
                    "message sent"
                );
                Ok(())
            }
            Err(e) => self.handle_send_failure(&job, &payload, e).await,
        }
    }

    async fn handle_send_failure(
        &self,
        job: &DispatchJob,
        payload: &SendPayload,
        error: WavecastError,
    ) -> Result<(), WavecastError> {
        let (code, message) = match &error {
            WavecastError::Gateway { code, message } => (code.clone(), message.clone()),
            other => ("INTERNAL".to_string(), other.to_string()),
        };
        deliveries::record_send_error(&self.db, &payload.delivery_id, &code, &message).await?;

        match queue::fail_with_backoff(&self.db, job.id, self.config.backoff_base_ms).await? {
            FailOutcome::Retry { attempts, delay_ms } => {
                warn!(
                    delivery_id = %payload.delivery_id,
                    code = %code,
                    attempts,
                    delay_ms,
                    "send failed, retry scheduled"
                );
            }
            FailOutcome::Exhausted => {
                deliveries::record_transition(
                    &self.db,
                    &payload.delivery_id,
                    DeliveryStatus::Failed,
                    Some(code.clone()),
                    Some(message),
                )
                .await?;
                if !campaigns::apply_stat_delta(
                    &self.db,
                    &payload.campaign_id,
                    DeliveryStatus::Sending,
                    DeliveryStatus::Failed,
                )
                .await?
                {
                    warn!(
                        campaign_id = %payload.campaign_id,
                        "stat delta skipped, counter already empty"
                    );
                }
                warn!(
                    delivery_id = %payload.delivery_id,
                    code = %code,
                    "attempts exhausted, delivery failed"
                );
            }
        }
        Ok(())
    }
}

/// Handle to the running worker loop.
pub struct DispatchHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl DispatchHandle {
    /// Signal the loop to stop and wait for it to finish its current tick.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
