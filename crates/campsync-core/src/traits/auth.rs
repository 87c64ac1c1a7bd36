// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication side of the remote platform.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::SyncError;
use crate::traits::adapter::PlatformAdapter;
use crate::types::{Credentials, Identity, SessionEvent, SignUpRequest};

/// Adapter for the platform's session and account operations.
///
/// Token lifecycle stays inside the platform; callers only ever see the
/// resulting [`Identity`].
#[async_trait]
pub trait AuthAdapter: PlatformAdapter {
    /// Returns the identity of an existing session, if any.
    async fn read_session(&self) -> Result<Option<Identity>, SyncError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, SyncError>;

    /// Creates an account and signs it in. Throttled attempts fail with
    /// [`SyncError::RateLimited`].
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Identity, SyncError>;

    async fn sign_out(&self) -> Result<(), SyncError>;

    /// Subscribes to out-of-band session changes.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
