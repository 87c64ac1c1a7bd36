// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process stand-in for the Campsync remote platform.
//!
//! [`MemoryPlatform`] implements both [`campsync_core::AuthAdapter`] and
//! [`campsync_core::DataAdapter`]: email/password accounts with a single
//! session slot, per-kind tables of JSON rows, server-assigned identifiers
//! and timestamps, and descriptor evaluation. It backs the demo binary and
//! the test suites.

pub mod fixtures;
pub mod platform;
mod tables;

pub use platform::MemoryPlatform;
