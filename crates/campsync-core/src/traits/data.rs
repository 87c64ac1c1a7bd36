// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data side of the remote platform: relational reads and writes.

use async_trait::async_trait;

use crate::entity::{Delta, Row, WriteAck, WriteTarget};
use crate::error::SyncError;
use crate::query::QueryDescriptor;
use crate::traits::adapter::PlatformAdapter;
use crate::types::EntityKind;

/// Adapter for reading and writing rows.
#[async_trait]
pub trait DataAdapter: PlatformAdapter {
    /// Executes a read and returns the raw rows in descriptor order.
    async fn query(&self, descriptor: &QueryDescriptor) -> Result<Vec<Row>, SyncError>;

    /// Applies a write and returns the committed row.
    ///
    /// Validation and permission failures come back as
    /// [`SyncError::MutationRejected`] with the platform's message.
    async fn write(
        &self,
        kind: EntityKind,
        target: &WriteTarget,
        delta: &Delta,
    ) -> Result<WriteAck, SyncError>;
}
