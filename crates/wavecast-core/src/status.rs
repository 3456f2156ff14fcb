// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery and campaign status types, and the pure transition function.
//!
//! A delivery only ever moves forward along
//! `queued -> sending -> sent -> delivered -> read`, with `failed` reachable
//! from any non-terminal state. [`advance`] decides whether a reported status
//! may be applied; timestamp stamping and persistence are the storage
//! layer's job, driven by the returned [`Transition`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Per-recipient delivery status.
///
/// The string forms (`queued`, `sending`, ...) are what the provider reports
/// in webhook callbacks and what is persisted in the `deliveries` table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    /// Position in the forward chain. `failed` sits outside the chain and
    /// is handled separately by [`advance`].
    fn ordinal(self) -> u8 {
        match self {
            DeliveryStatus::Queued => 0,
            DeliveryStatus::Sending => 1,
            DeliveryStatus::Sent => 2,
            DeliveryStatus::Delivered => 3,
            DeliveryStatus::Read => 4,
            DeliveryStatus::Failed => 5,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Read | DeliveryStatus::Failed)
    }
}

/// Campaign lifecycle status.
///
/// `completed` is never commanded directly: it is inferred on read when no
/// delivery remains in `queued` or `sending`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    InProgress,
    Completed,
    Failed,
}

/// Outcome of applying a reported status to a delivery's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Forward transition; persist the new status.
    Apply(DeliveryStatus),
    /// Duplicate report of the current status; nothing to do.
    Noop,
    /// Out-of-order or backward report; must not regress the record.
    Rejected,
}

/// Pure transition function for the delivery state machine.
///
/// Rules:
/// - equal statuses are an idempotent no-op;
/// - a status later in the chain is applied, including jumps (a `delivered`
///   callback may land while the record still reads `sending`);
/// - a status earlier in the chain is rejected, never applied;
/// - `failed` is reachable from any non-terminal state and is terminal;
/// - nothing leaves a terminal state.
pub fn advance(current: DeliveryStatus, reported: DeliveryStatus) -> Transition {
    if current == reported {
        return Transition::Noop;
    }
    if current.is_terminal() {
        return Transition::Rejected;
    }
    if reported == DeliveryStatus::Failed {
        return Transition::Apply(DeliveryStatus::Failed);
    }
    if reported.ordinal() > current.ordinal() {
        Transition::Apply(reported)
    } else {
        Transition::Rejected
    }
}
