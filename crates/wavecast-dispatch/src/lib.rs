// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Wavecast delivery worker.
//!
//! A single-consumer loop over the durable dispatch queue: rate-limited
//! dequeue, one gateway send per job, and reconciliation of the delivery
//! record and campaign counters with each outcome.

pub mod limiter;
pub mod service;

pub use limiter::RateLimiter;
pub use service::{DispatchHandle, DispatchService, Tick, QUEUE_NAME};
