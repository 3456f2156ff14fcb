// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Wavecast dispatch pipeline.

use thiserror::Error;

/// The primary error type used across all Wavecast crates.
#[derive(Debug, Error)]
pub enum WavecastError {
    /// A fan-out request was rejected before any work was created
    /// (missing template name, empty recipient set). Never retried;
    /// surfaced synchronously to the caller.
    #[error("validation error: {0}")]
    Validation(String),

    /// The messaging provider rejected a send. Retried by the dispatch
    /// queue until attempts are exhausted.
    #[error("gateway error {code}: {message}")]
    Gateway { code: String, message: String },

    /// A referenced record is missing. Treated as a data-integrity fault:
    /// retrying cannot resolve it, so the dispatch queue fails the job
    /// permanently.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A status callback referenced a provider message identifier this
    /// system has no record of. Logged and dropped, never surfaced to
    /// the provider.
    #[error("no delivery matches provider message id {provider_message_id}")]
    CallbackMismatch { provider_message_id: String },

    /// Storage backend errors (database connection, query failure,
    /// serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WavecastError {
    /// True for errors the dispatch queue should retry.
    ///
    /// Only gateway rejections are worth another attempt; everything else
    /// is either permanent (missing state) or not a worker concern.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WavecastError::Gateway { .. })
    }
}
