// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Wavecast bulk-messaging pipeline.
//!
//! This crate provides the shared error type, the delivery state machine,
//! and the messaging gateway trait that the dispatch worker and the status
//! ingestor are written against.

pub mod error;
pub mod gateway;
pub mod status;

// Re-export key items at crate root for ergonomic imports.
pub use error::WavecastError;
pub use gateway::{ApprovedTemplate, MessagingGateway, ProviderMessageId, StatusEvent};
pub use status::{advance, CampaignStatus, DeliveryStatus, Transition};
