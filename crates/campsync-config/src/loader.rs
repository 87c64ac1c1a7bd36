// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./campsync.toml` > `~/.config/campsync/campsync.toml`
//! > `/etc/campsync/campsync.toml`, with environment variable overrides via the
//! `CAMPSYNC_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use tracing::debug;

use crate::model::SyncConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/campsync/campsync.toml`
/// 3. `~/.config/campsync/campsync.toml`
/// 4. `./campsync.toml`
/// 5. `CAMPSYNC_*` environment variables
pub fn load_config() -> Result<SyncConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SyncConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SyncConfig, figment::Error> {
    debug!(path = %path.display(), "loading config file");
    Figment::new()
        .merge(Serialized::defaults(SyncConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files consulted by [`load_config`], lowest priority first.
/// Missing files are skipped.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/campsync/campsync.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("campsync").join("campsync.toml"));
    }
    paths.push(PathBuf::from("campsync.toml"));
    paths
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(SyncConfig::default()));
    for path in search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "found config file");
        }
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Top-level config sections, as they appear in env var names.
const SECTIONS: [&str; 6] = ["client", "auth", "cache", "mutation", "screens", "memory"];

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `CAMPSYNC_AUTH_MIN_PASSWORD_LEN` must map to
/// `auth.min_password_len`, not `auth.min.password.len`.
fn env_provider() -> Env {
    Env::prefixed("CAMPSYNC_").map(|key| {
        let key_str = key.as_str();
        SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|field| format!("{section}.{field}"))
            })
            .unwrap_or_else(|| key_str.to_string())
            .into()
    })
}
