// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wavecast.toml` > `~/.config/wavecast/wavecast.toml` > `/etc/wavecast/wavecast.toml`
//! with environment variable overrides via `WAVECAST_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::WavecastConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wavecast/wavecast.toml` (system-wide)
/// 3. `~/.config/wavecast/wavecast.toml` (user XDG config)
/// 4. `./wavecast.toml` (local directory)
/// 5. `WAVECAST_*` environment variables
pub fn load_config() -> Result<WavecastConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WavecastConfig::default()))
        .merge(Toml::file("/etc/wavecast/wavecast.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("wavecast/wavecast.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("wavecast.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a specific TOML string only (no XDG lookup).
///
/// Used for testing and explicit config file specification.
pub fn load_config_from_str(toml_content: &str) -> Result<WavecastConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WavecastConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WavecastConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WavecastConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `WAVECAST_WHATSAPP_ACCESS_TOKEN`
/// must map to `whatsapp.access_token`, not `whatsapp.access.token`.
fn env_provider() -> Env {
    Env::prefixed("WAVECAST_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: WAVECAST_WHATSAPP_ACCESS_TOKEN -> "whatsapp_access_token"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("whatsapp_", "whatsapp.", 1)
            .replacen("webhook_", "webhook.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("queue_", "queue.", 1);
        mapped.into()
    })
}
