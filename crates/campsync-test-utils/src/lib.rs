// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Campsync integration tests.
//!
//! Provides a scriptable platform and a harness for fast, deterministic
//! tests of the sync core and screens without a real backend.
//!
//! # Components
//!
//! - [`ScriptedPlatform`] - in-memory platform with failure injection,
//!   held reads/writes, and call counters
//! - [`TestHarness`] - config + platform + connected, signed-in client

pub mod harness;
pub mod scripted;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use scripted::ScriptedPlatform;
