// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Campsync.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Client identity and logging.
    #[serde(default)]
    pub client: ClientConfig,

    /// Sign-in and sign-up rules.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Query cache behavior.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Optimistic mutation settings.
    #[serde(default)]
    pub mutation: MutationConfig,

    /// Screen-level limits.
    #[serde(default)]
    pub screens: ScreensConfig,

    /// In-process platform settings (demo and tests).
    #[serde(default)]
    pub memory: MemoryPlatformConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_client_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_client_name() -> String {
    "campsync".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Minimum sign-up password length.
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,

    /// Message shown when the platform throttles sign-ups.
    #[serde(default = "default_rate_limit_message")]
    pub rate_limit_message: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_len: default_min_password_len(),
            rate_limit_message: default_rate_limit_message(),
        }
    }
}

fn default_min_password_len() -> usize {
    3
}

fn default_rate_limit_message() -> String {
    "Email rate limit exceeded. Please wait a few minutes before trying again.".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Treat resolved results older than this as stale. `None` means results
    /// only go stale through invalidation.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MutationConfig {
    /// Prefix for local-only identifiers given to optimistic inserts.
    #[serde(default = "default_temp_id_prefix")]
    pub temp_id_prefix: String,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            temp_id_prefix: default_temp_id_prefix(),
        }
    }
}

fn default_temp_id_prefix() -> String {
    "local-".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScreensConfig {
    /// Number of recent projects on the dashboard.
    #[serde(default = "default_dashboard_limit")]
    pub dashboard_recent_projects: usize,

    /// Number of upcoming events on the dashboard.
    #[serde(default = "default_dashboard_limit")]
    pub dashboard_upcoming_events: usize,
}

impl Default for ScreensConfig {
    fn default() -> Self {
        Self {
            dashboard_recent_projects: default_dashboard_limit(),
            dashboard_upcoming_events: default_dashboard_limit(),
        }
    }
}

fn default_dashboard_limit() -> usize {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryPlatformConfig {
    /// Seed the fixture students, projects, events and conversations.
    #[serde(default = "default_seed_fixtures")]
    pub seed_fixtures: bool,

    /// Sign-ups allowed per window before the platform throttles.
    #[serde(default = "default_signup_limit")]
    pub signup_limit_per_window: u32,

    #[serde(default = "default_signup_window_secs")]
    pub signup_window_secs: u64,
}

impl Default for MemoryPlatformConfig {
    fn default() -> Self {
        Self {
            seed_fixtures: default_seed_fixtures(),
            signup_limit_per_window: default_signup_limit(),
            signup_window_secs: default_signup_window_secs(),
        }
    }
}

fn default_seed_fixtures() -> bool {
    true
}

fn default_signup_limit() -> u32 {
    5
}

fn default_signup_window_secs() -> u64 {
    60
}
