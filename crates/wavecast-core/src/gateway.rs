// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging gateway trait for the external provider, plus the status event
//! type carried from webhook parsing into the ingestor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WavecastError;
use crate::status::DeliveryStatus;

/// The provider's identifier for a sent message, used to correlate later
/// asynchronous status callbacks back to a delivery record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderMessageId(pub String);

/// An approved message template as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedTemplate {
    pub name: String,
    pub language: String,
    pub category: Option<String>,
}

/// One status update extracted from a provider webhook callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Provider message id the update refers to.
    pub provider_message_id: String,
    /// Reported status, already parsed into the delivery state space.
    pub status: DeliveryStatus,
    /// Provider-side timestamp (unix seconds as reported), if present.
    pub timestamp: Option<String>,
    /// Recipient the provider associates with the message.
    pub recipient_id: Option<String>,
    /// Error details, populated when the reported status is `failed`.
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Adapter seam for the external messaging provider.
///
/// Implementations are plain synchronous remote calls with no retry logic of
/// their own; retry is the dispatch queue's responsibility. Tests substitute
/// scripted implementations to drive the worker deterministically.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Sends one approved-template message and returns the provider's
    /// message identifier.
    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        language_code: &str,
        variables: &[String],
    ) -> Result<ProviderMessageId, WavecastError>;

    /// Lists templates the provider has approved for sending.
    async fn fetch_approved_templates(&self) -> Result<Vec<ApprovedTemplate>, WavecastError>;
}
