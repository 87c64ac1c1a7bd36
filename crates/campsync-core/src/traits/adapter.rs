// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all platform adapters must implement.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for all platform adapters.
///
/// Provides identity, lifecycle, and health check capabilities.
#[async_trait]
pub trait PlatformAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, SyncError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), SyncError>;
}
