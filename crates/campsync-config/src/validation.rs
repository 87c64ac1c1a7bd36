// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::SyncConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.client.log_level.trim().to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "client.log_level `{}` must be one of {}",
                config.client.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.auth.min_password_len < 1 {
        errors.push(ConfigError::Validation {
            message: "auth.min_password_len must be at least 1".to_string(),
        });
    }

    if config.mutation.temp_id_prefix.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "mutation.temp_id_prefix must not be empty".to_string(),
        });
    }

    if config.screens.dashboard_recent_projects < 1 {
        errors.push(ConfigError::Validation {
            message: "screens.dashboard_recent_projects must be at least 1".to_string(),
        });
    }

    if config.screens.dashboard_upcoming_events < 1 {
        errors.push(ConfigError::Validation {
            message: "screens.dashboard_upcoming_events must be at least 1".to_string(),
        });
    }

    if config.memory.signup_window_secs < 1 {
        errors.push(ConfigError::Validation {
            message: "memory.signup_window_secs must be at least 1".to_string(),
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

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = SyncConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = SyncConfig::default();
        config.client.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "client.log_level"));
    }

    #[test]
    fn zero_password_len_fails_validation() {
        let mut config = SyncConfig::default();
        config.auth.min_password_len = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "min_password_len"));
    }

    #[test]
    fn collects_every_error() {
        let mut config = SyncConfig::default();
        config.mutation.temp_id_prefix = "  ".to_string();
        config.screens.dashboard_recent_projects = 0;
        config.memory.signup_window_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_error(&errors, "temp_id_prefix"));
        assert!(has_error(&errors, "dashboard_recent_projects"));
        assert!(has_error(&errors, "signup_window_secs"));
    }
}
