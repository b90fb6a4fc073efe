// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use std::path::Path;

use crate::diagnostic::ConfigError;
use crate::model::SerialiteConfig;

/// Log levels accepted by `log.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing fast.
pub fn validate_config(config: &SerialiteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let storage = &config.storage;

    if storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if storage.busy_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "storage.busy_timeout_ms must be greater than zero".to_string(),
        });
    }

    if let Some(dir) = &storage.schema_dir
        && !Path::new(dir).is_dir()
    {
        errors.push(ConfigError::Validation {
            message: format!("storage.schema_dir `{dir}` is not a directory"),
        });
    }

    let level = config.log.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
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

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&SerialiteConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = SerialiteConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn zero_busy_timeout_fails_validation() {
        let mut config = SerialiteConfig::default();
        config.storage.busy_timeout_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "busy_timeout_ms"));
    }

    #[test]
    fn missing_schema_dir_fails_validation() {
        let mut config = SerialiteConfig::default();
        config.storage.schema_dir = Some("/definitely/not/here".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "schema_dir"));
    }

    #[test]
    fn existing_schema_dir_passes() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SerialiteConfig::default();
        config.storage.schema_dir = Some(dir.path().display().to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = SerialiteConfig::default();
        config.storage.database_path = String::new();
        config.storage.busy_timeout_ms = 0;
        config.log.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_message(&errors, "log.level"));
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = SerialiteConfig::default();
        config.log.level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
