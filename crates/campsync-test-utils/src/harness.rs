// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a scripted platform and a connected
//! [`SyncClient`], optionally seeded with fixtures and signed in.

use std::sync::Arc;

use campsync_config::SyncConfig;
use campsync_core::{AuthAdapter, Credentials, Identity, SignUpRequest, SyncError};
use campsync_memory::fixtures::{DEMO_EMAIL, DEMO_PASSWORD};
use campsync_memory::MemoryPlatform;
use campsync_sync::SyncClient;

use crate::scripted::ScriptedPlatform;

/// Email of the account an unseeded harness signs in as.
pub const TEST_EMAIL: &str = "student@campus.edu";
pub const TEST_PASSWORD: &str = "secret";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: SyncConfig,
    seeded: bool,
    signed_in: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = SyncConfig::default();
        config.memory.seed_fixtures = false;
        Self {
            config,
            seeded: false,
            signed_in: true,
        }
    }

    /// Seed the fixture data and sign in as the demo account.
    pub fn seeded(mut self) -> Self {
        self.seeded = true;
        self
    }

    /// Start with no session.
    pub fn signed_out(mut self) -> Self {
        self.signed_in = false;
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the platform, sign in if asked, and connect the client.
    pub async fn build(self) -> Result<TestHarness, SyncError> {
        let mut memory_config = self.config.memory.clone();
        memory_config.seed_fixtures = self.seeded;
        let platform = Arc::new(ScriptedPlatform::new(MemoryPlatform::new(memory_config)));

        if self.signed_in {
            if self.seeded {
                platform
                    .sign_in(&Credentials {
                        email: DEMO_EMAIL.into(),
                        password: DEMO_PASSWORD.into(),
                    })
                    .await?;
            } else {
                platform
                    .sign_up(&SignUpRequest {
                        email: TEST_EMAIL.into(),
                        password: TEST_PASSWORD.into(),
                        metadata: Default::default(),
                    })
                    .await?;
            }
        }

        let client = SyncClient::connect(self.config, platform.clone()).await?;
        Ok(TestHarness { platform, client })
    }
}

/// A connected client over a scripted platform.
pub struct TestHarness {
    pub platform: Arc<ScriptedPlatform>,
    pub client: SyncClient,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Unseeded, signed in as [`TEST_EMAIL`].
    pub async fn new() -> Result<Self, SyncError> {
        Self::builder().build().await
    }

    /// The signed-in identity. Fails for a signed-out harness.
    pub async fn identity(&self) -> Result<Identity, SyncError> {
        self.client.identity().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campsync_sync::SessionState;

    #[tokio::test]
    async fn harness_is_signed_in_by_default() {
        let harness = TestHarness::new().await.unwrap();
        assert_eq!(harness.identity().await.unwrap().email, TEST_EMAIL);
    }

    #[tokio::test]
    async fn seeded_harness_uses_demo_account() {
        let harness = TestHarness::builder().seeded().build().await.unwrap();
        assert_eq!(harness.identity().await.unwrap().email, DEMO_EMAIL);
    }

    #[tokio::test]
    async fn signed_out_harness_has_no_identity() {
        let harness = TestHarness::builder().signed_out().build().await.unwrap();
        assert_eq!(
            harness.client.session().current(),
            SessionState::Unauthenticated
        );
        assert_eq!(harness.identity().await, Err(SyncError::Unauthenticated));
    }
}
