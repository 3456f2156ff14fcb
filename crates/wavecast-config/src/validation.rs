// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses and non-zero queue limits.

use crate::diagnostic::ConfigError;
use crate::model::WavecastConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &WavecastConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.queue.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.max_attempts must be at least 1".to_string(),
        });
    }

    if config.queue.rate_limit_max == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.rate_limit_max must be at least 1".to_string(),
        });
    }

    if config.queue.rate_limit_window_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.rate_limit_window_secs must be at least 1".to_string(),
        });
    }

    // An access token without a phone number id (or vice versa) is a
    // misconfiguration that would only surface on the first send.
    if config.whatsapp.access_token.is_some() != config.whatsapp.phone_number_id.is_some() {
        errors.push(ConfigError::Validation {
            message: "whatsapp.access_token and whatsapp.phone_number_id must be set together"
                .to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = WavecastConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = WavecastConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn zero_max_attempts_fails_validation() {
        let mut config = WavecastConfig::default();
        config.queue.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("max_attempts"))));
    }

    #[test]
    fn token_without_phone_number_fails_validation() {
        let mut config = WavecastConfig::default();
        config.whatsapp.access_token = Some("token".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("set together"))));
    }

    #[test]
    fn complete_whatsapp_section_passes() {
        let mut config = WavecastConfig::default();
        config.whatsapp.access_token = Some("token".to_string());
        config.whatsapp.phone_number_id = Some("1234567890".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
