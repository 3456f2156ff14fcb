// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Wavecast dispatch pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Wavecast configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WavecastConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// WhatsApp Cloud API credentials and endpoints.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Webhook verification settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Dispatch queue and worker settings.
    #[serde(default)]
    pub queue: QueueConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API base URL including version segment.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Phone number id the messages are sent from. `None` disables sending.
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// Business account id used for template listing.
    #[serde(default)]
    pub business_account_id: Option<String>,

    /// Bearer token for the Cloud API.
    #[serde(default)]
    pub access_token: Option<String>,

    /// App secret for webhook payload signature verification.
    /// `None` skips signature checks.
    #[serde(default)]
    pub app_secret: Option<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            phone_number_id: None,
            business_account_id: None,
            access_token: None,
            app_secret: None,
        }
    }
}

fn default_api_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

/// Webhook verification configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Token the provider echoes during the subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("wavecast").join("wavecast.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "wavecast.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Dispatch queue and delivery worker configuration.
///
/// Defaults mirror the provider's documented rate limit (30 sends per
/// rolling minute) and a conservative 2-second stagger between queued
/// messages of the same campaign.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Fixed inter-message admission delay, multiplied by the recipient's
    /// ordinal position in the fan-out batch.
    #[serde(default = "default_message_delay_ms")]
    pub message_delay_ms: u64,

    /// Total attempts per job (first attempt included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base retry delay; doubles on each subsequent retry.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Hard ceiling on dequeues per rolling window.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    /// Rolling rate-limit window length in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Idle sleep between polls when no job is due.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Completed jobs retained for observability (bounded count).
    #[serde(default = "default_keep_completed")]
    pub keep_completed: u32,

    /// Completed jobs older than this are pruned regardless of count.
    #[serde(default = "default_completed_max_age_hours")]
    pub completed_max_age_hours: u32,

    /// Failed jobs retained for postmortem (larger bounded count).
    #[serde(default = "default_keep_failed")]
    pub keep_failed: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            message_delay_ms: default_message_delay_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            keep_completed: default_keep_completed(),
            completed_max_age_hours: default_completed_max_age_hours(),
            keep_failed: default_keep_failed(),
        }
    }
}

fn default_message_delay_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    5000
}

fn default_rate_limit_max() -> u32 {
    30
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_keep_completed() -> u32 {
    100
}

fn default_completed_max_age_hours() -> u32 {
    24
}

fn default_keep_failed() -> u32 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_limits() {
        let config = WavecastConfig::default();
        assert_eq!(config.queue.message_delay_ms, 2000);
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.backoff_base_ms, 5000);
        assert_eq!(config.queue.rate_limit_max, 30);
        assert_eq!(config.queue.rate_limit_window_secs, 60);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml_str = r#"
[queue]
max_atempts = 5
"#;
        let result = toml::from_str::<WavecastConfig>(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let toml_str = r#"
[whatsapp]
phone_number_id = "1234567890"
access_token = "token"
"#;
        let config: WavecastConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.whatsapp.phone_number_id.as_deref(), Some("1234567890"));
        assert_eq!(config.whatsapp.api_url, "https://graph.facebook.com/v18.0");
        assert_eq!(config.server.port, 5000);
    }
}
