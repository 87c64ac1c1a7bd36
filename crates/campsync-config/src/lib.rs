// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for Campsync.
//!
//! Settings come from compiled defaults, TOML files in the XDG hierarchy and
//! `CAMPSYNC_*` environment variables. Unknown keys are rejected, and every
//! error is reported as a [`ConfigError`] that miette can render against the
//! file it came from.
//!
//! ```no_run
//! let config = campsync_config::load_and_validate().expect("config errors");
//! println!("client name: {}", config.client.name);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SyncConfig;

/// Validate a loaded config, or turn the load error into diagnostics.
/// `sources` is only read on failure: (display name, TOML text) pairs used
/// to place error spans.
fn finish(
    loaded: Result<SyncConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<SyncConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn read_source(path: &Path) -> Option<(String, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    let name = if path.is_relative() {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    } else {
        path.to_path_buf()
    };
    Some((name.display().to_string(), content))
}

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<SyncConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || {
        loader::search_paths()
            .iter()
            .rev()
            .filter_map(|path| read_source(path))
            .collect()
    })
}

/// Load configuration from one file (plus environment overrides) and
/// validate it.
pub fn load_and_validate_path(path: &Path) -> Result<SyncConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SyncConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}
