// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./serialite.toml` > `~/.config/serialite/serialite.toml`
//! > `/etc/serialite/serialite.toml` with environment variable overrides via the
//! `SERIALITE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SerialiteConfig;

/// Local config file name, looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "serialite.toml";

/// System-wide config file.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/serialite/serialite.toml";

/// Path of the per-user config file, if the platform has a config directory.
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("serialite").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/serialite/serialite.toml` (system-wide)
/// 3. `~/.config/serialite/serialite.toml` (user XDG config)
/// 4. `./serialite.toml` (local directory)
/// 5. `SERIALITE_*` environment variables
pub fn load_config() -> Result<SerialiteConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SerialiteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SerialiteConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SerialiteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SerialiteConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SerialiteConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_FILE))
        .merge(Toml::file(user_config_file().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` and not `Env::split("_")`: `SERIALITE_STORAGE_DATABASE_PATH`
/// must map to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("SERIALITE_").map(|key| {
        // `key` keeps the env var's case once the prefix is stripped.
        let mapped = key
            .as_str()
            .to_ascii_lowercase()
            .replacen("storage_", "storage.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}
