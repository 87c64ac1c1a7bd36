// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Campsync.

use thiserror::Error;

use crate::types::EntityKind;

/// The error type used across all adapter traits and sync operations.
///
/// Every failure coming back from the remote platform is returned as one of
/// these variants; nothing in the sync core retries on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The remote session check failed.
    #[error("session unavailable: {message}")]
    SessionUnavailable { message: String },

    /// The operation needs a signed-in identity and there is none.
    #[error("not signed in")]
    Unauthenticated,

    /// A remote read failed.
    #[error("query on {kind} failed: {message}")]
    QueryFailed { kind: EntityKind, message: String },

    /// A remote write failed validation or permission checks.
    ///
    /// The message is the platform's, unchanged.
    #[error("{message}")]
    MutationRejected { kind: EntityKind, message: String },

    /// The authentication write path was throttled. Callers should ask the
    /// user to retry later.
    #[error("{message}")]
    RateLimited { message: String },

    /// A remote row did not match the schema for its kind.
    #[error("invalid {kind} row: {message}")]
    Schema { kind: EntityKind, message: String },

    /// The session ended or changed identity while a read or write was in
    /// flight, so its result was dropped.
    #[error("session changed before the operation resolved")]
    SessionChanged,

    /// Caller-side validation failure.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// True for write rejections, including the rate-limited subtype.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SyncError::MutationRejected { .. } | SyncError::RateLimited { .. }
        )
    }

    /// True when the platform throttled an authentication write.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SyncError::RateLimited { .. })
    }
}
