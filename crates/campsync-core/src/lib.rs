// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Campsync.
//!
//! This crate provides the types shared by every other crate in the
//! workspace: identifiers, field values, entities, query descriptors, the
//! single [`SyncError`] type, and the adapter traits a remote data platform
//! implements.

pub mod entity;
pub mod error;
pub mod query;
pub mod traits;
pub mod types;
pub mod value;

// Re-export key items at crate root for ergonomic imports.
pub use entity::{Delta, Entity, Row, WriteAck, WriteTarget};
pub use error::SyncError;
pub use query::{Filter, FilterOp, QueryDescriptor, SortDirection, SortKey};
pub use types::{
    AdapterType, Credentials, EntityId, EntityKind, HealthStatus, Identity, SessionEvent,
    SignUpRequest, UserId,
};
pub use value::{Fields, Value};

pub use traits::{AuthAdapter, DataAdapter, Platform, PlatformAdapter};
