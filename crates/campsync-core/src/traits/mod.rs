// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the remote data platform.
//!
//! All adapters extend the [`PlatformAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod auth;
pub mod data;

pub use adapter::PlatformAdapter;
pub use auth::AuthAdapter;
pub use data::DataAdapter;

/// A remote platform serving both authentication and data.
///
/// The sync client holds one `Arc<dyn Platform>`.
pub trait Platform: AuthAdapter + DataAdapter {}

impl<T: AuthAdapter + DataAdapter> Platform for T {}
