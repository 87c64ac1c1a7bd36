// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side data sync for Campsync.
//!
//! Four components, leaves first:
//!
//! - [`EntityStore`]: keyed in-memory records, the single source of truth
//!   screens render from.
//! - [`QueryCache`]: descriptor-keyed identifier lists with lazy staleness.
//! - [`MutationCoordinator`]: optimistic writes, committed or rolled back
//!   when the platform answers, serialized per key.
//! - [`SessionGate`]: the signed-in identity; every read and write waits on it.
//!
//! [`SyncClient`] wires them to one platform.

pub mod client;
pub mod mutation;
pub mod query_cache;
pub mod schema;
pub mod session;
pub mod store;

pub use client::SyncClient;
pub use mutation::{MutationCoordinator, MutationHandle, MutationState};
pub use query_cache::{QueryCache, QueryResult};
pub use session::{SessionGate, SessionState};
pub use store::{EntityStore, EpochChanged, Snapshot};
