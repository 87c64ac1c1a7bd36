// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Descriptor-keyed cache of remote read results.
//!
//! A cached [`QueryResult`] holds identifiers only; entity state always comes
//! from the [`EntityStore`], so a result never shows a version of a record
//! older than what the store holds.
//!
//! Concurrent resolves of an equal descriptor share one remote read. The read
//! runs on its own task, so a caller that stops waiting does not cancel it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use campsync_core::{Entity, EntityId, EntityKind, Platform, QueryDescriptor, SyncError};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::schema;
use crate::store::EntityStore;

/// Ordered identifiers produced by one resolution of a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub kind: EntityKind,
    pub ids: Vec<EntityId>,
    /// Set by invalidation, by a failed refresh, or when the read raced an
    /// invalidation. A stale result is re-read on the next resolve.
    pub stale: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    /// The failure of the most recent read, if it failed. `ids` then holds
    /// the previous successful result, or nothing.
    pub error: Option<SyncError>,
}

impl QueryResult {
    fn failed(kind: EntityKind, error: SyncError) -> Self {
        Self {
            kind,
            ids: Vec::new(),
            stale: true,
            resolved_at: None,
            error: Some(error),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

type SharedRead = Shared<BoxFuture<'static, QueryResult>>;

struct Flight {
    id: u64,
    read: SharedRead,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryDescriptor, QueryResult>,
    inflight: HashMap<QueryDescriptor, Flight>,
    next_flight: u64,
}

pub struct QueryCache {
    platform: Arc<dyn Platform>,
    store: Arc<EntityStore>,
    state: Mutex<CacheState>,
    max_age: Option<chrono::Duration>,
}

impl QueryCache {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Arc<EntityStore>,
        max_age: Option<std::time::Duration>,
    ) -> Self {
        Self {
            platform,
            store,
            state: Mutex::new(CacheState::default()),
            max_age: max_age.and_then(|d| chrono::Duration::from_std(d).ok()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, result: &QueryResult) -> bool {
        if result.stale {
            return false;
        }
        match (self.max_age, result.resolved_at) {
            (Some(max_age), Some(at)) => Utc::now() - at < max_age,
            _ => true,
        }
    }

    /// Return the cached result for `descriptor` if it is fresh, otherwise
    /// read it from the platform, merge the rows into the store, and cache
    /// the identifiers.
    ///
    /// Failures are reported in [`QueryResult::error`], never as a panic or
    /// a dropped result.
    pub async fn resolve(self: &Arc<Self>, descriptor: &QueryDescriptor) -> QueryResult {
        let epoch = self.store.epoch();
        self.resolve_at(descriptor, epoch).await
    }

    /// [`QueryCache::resolve`] on behalf of the session that owns store
    /// `epoch`. If that session has already ended, nothing is read and the
    /// result carries [`SyncError::SessionChanged`].
    pub async fn resolve_at(self: &Arc<Self>, descriptor: &QueryDescriptor, epoch: u64) -> QueryResult {
        let read = {
            let mut state = self.lock();
            if self.store.epoch() != epoch {
                debug!(query = %descriptor, "query from an ended session");
                return QueryResult::failed(descriptor.kind, SyncError::SessionChanged);
            }
            if let Some(cached) = state.entries.get(descriptor) {
                if self.is_fresh(cached) {
                    debug!(query = %descriptor, "query cache hit");
                    return cached.clone();
                }
            }
            match state.inflight.get(descriptor) {
                Some(flight) => {
                    debug!(query = %descriptor, "joining in-flight read");
                    flight.read.clone()
                }
                None => {
                    debug!(query = %descriptor, "query cache miss");
                    state.next_flight += 1;
                    let id = state.next_flight;
                    let read = self.spawn_read(descriptor.clone(), id, epoch);
                    state.inflight.insert(
                        descriptor.clone(),
                        Flight {
                            id,
                            read: read.clone(),
                        },
                    );
                    read
                }
            }
        };
        read.await
    }

    // Called with the state lock held and `epoch` checked current.
    fn spawn_read(self: &Arc<Self>, descriptor: QueryDescriptor, flight: u64, epoch: u64) -> SharedRead {
        let kind = descriptor.kind;
        let cache = Arc::clone(self);
        let task = tokio::spawn(async move { cache.read(descriptor, flight, epoch).await });
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => QueryResult::failed(kind, SyncError::Internal(format!("query task failed: {e}"))),
            }
        }
        .boxed()
        .shared()
    }

    async fn read(&self, descriptor: QueryDescriptor, flight: u64, epoch: u64) -> QueryResult {
        let kind = descriptor.kind;
        debug!(query = %descriptor, "remote read");
        let outcome = self
            .platform
            .query(&descriptor)
            .await
            .map_err(|e| classify_read_error(kind, e))
            .and_then(|rows| {
                rows.iter()
                    .map(|row| schema::validate(kind, row))
                    .collect::<Result<Vec<_>, _>>()
            });

        let mut state = self.lock();
        // Invalidation and clearing both drop the flight, so a read that
        // raced either one is no longer current.
        let current = state
            .inflight
            .get(&descriptor)
            .is_some_and(|f| f.id == flight);
        if current {
            state.inflight.remove(&descriptor);
        }
        if self.store.epoch() != epoch {
            warn!(query = %descriptor, "discarding read from an ended session");
            return QueryResult::failed(kind, SyncError::SessionChanged);
        }

        match outcome {
            Ok(entities) => {
                let ids: Vec<EntityId> = entities.iter().map(|e| e.id.clone()).collect();
                if current {
                    if self.store.merge_remote(epoch, &entities).is_err() {
                        return QueryResult::failed(kind, SyncError::SessionChanged);
                    }
                } else {
                    debug!(query = %descriptor, "read raced an invalidation, not merging");
                }
                let result = QueryResult {
                    kind,
                    ids,
                    stale: !current,
                    resolved_at: Some(Utc::now()),
                    error: None,
                };
                if current {
                    state.entries.insert(descriptor, result.clone());
                }
                result
            }
            Err(error) => {
                if matches!(error, SyncError::Schema { .. }) {
                    warn!(query = %descriptor, error = %error, "rejected invalid row");
                } else {
                    warn!(query = %descriptor, error = %error, "remote read failed");
                }
                let result = match state.entries.get(&descriptor) {
                    Some(prior) => QueryResult {
                        kind,
                        ids: prior.ids.clone(),
                        stale: true,
                        resolved_at: prior.resolved_at,
                        error: Some(error),
                    },
                    None => QueryResult::failed(kind, error),
                };
                if current {
                    state.entries.insert(descriptor, result.clone());
                }
                result
            }
        }
    }

    /// Mark every cached result of `kind` stale. In-flight reads of that kind
    /// stop being current: their rows are not merged and the next resolve
    /// issues a fresh read.
    pub fn invalidate(&self, kind: EntityKind) {
        let mut state = self.lock();
        let mut marked = 0usize;
        for (descriptor, result) in state.entries.iter_mut() {
            if descriptor.kind == kind {
                result.stale = true;
                marked += 1;
            }
        }
        state.inflight.retain(|descriptor, _| descriptor.kind != kind);
        debug!(kind = %kind, marked, "invalidated cached queries");
    }

    /// Drop every cached result and forget in-flight reads.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.inflight.clear();
    }

    /// The cached result for `descriptor`, fresh or not, without reading.
    pub fn peek(&self, descriptor: &QueryDescriptor) -> Option<QueryResult> {
        self.lock().entries.get(descriptor).cloned()
    }

    /// Materialize a result's entities from the store, in result order.
    /// Identifiers no longer present in the store are skipped.
    pub fn entities(&self, result: &QueryResult) -> Vec<Entity> {
        result
            .ids
            .iter()
            .filter_map(|id| self.store.get(result.kind, id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

/// Read failures surface as [`SyncError::QueryFailed`] unless the platform
/// already classified them as a schema or session problem.
fn classify_read_error(kind: EntityKind, error: SyncError) -> SyncError {
    match error {
        SyncError::QueryFailed { .. }
        | SyncError::Schema { .. }
        | SyncError::SessionChanged
        | SyncError::Unauthenticated => error,
        other => SyncError::QueryFailed {
            kind,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campsync_core::{Filter, Row, SortKey, Value};
    use campsync_memory::MemoryPlatform;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn setup() -> (Arc<MemoryPlatform>, Arc<EntityStore>, Arc<QueryCache>) {
        let platform = Arc::new(MemoryPlatform::empty());
        let store = Arc::new(EntityStore::new());
        let cache = Arc::new(QueryCache::new(platform.clone(), store.clone(), None));
        (platform, store, cache)
    }

    fn projects() -> QueryDescriptor {
        QueryDescriptor::new(EntityKind::Project).sort(SortKey::desc("created_at"))
    }

    #[tokio::test]
    async fn resolve_populates_store_in_order() {
        let (platform, store, cache) = setup();
        platform
            .insert_row(EntityKind::Project, row(serde_json::json!({"id": "A", "title": "first"})))
            .unwrap();
        platform
            .insert_row(EntityKind::Project, row(serde_json::json!({"id": "B", "title": "second"})))
            .unwrap();

        let result = cache.resolve(&projects()).await;
        assert_eq!(result.ids, vec![EntityId::new("B"), EntityId::new("A")]);
        assert!(!result.stale);
        assert!(result.error.is_none());
        assert_eq!(store.len(EntityKind::Project), 2);

        let titles: Vec<String> = cache
            .entities(&result)
            .iter()
            .map(|e| e.text("title").unwrap_or_default().to_string())
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let (platform, _store, cache) = setup();
        platform
            .insert_row(EntityKind::Project, row(serde_json::json!({"id": "A", "title": "a"})))
            .unwrap();
        let first = cache.resolve(&projects()).await;

        // Not visible until the cached result goes stale.
        platform
            .insert_row(EntityKind::Project, row(serde_json::json!({"id": "B", "title": "b"})))
            .unwrap();
        let second = cache.resolve(&projects()).await;
        assert_eq!(first.ids, second.ids);

        cache.invalidate(EntityKind::Project);
        assert!(cache.peek(&projects()).unwrap().stale);
        let third = cache.resolve(&projects()).await;
        assert_eq!(third.ids.len(), 2);
        assert!(!third.stale);
    }

    #[tokio::test]
    async fn resolve_for_ended_session_reads_nothing() {
        let (platform, store, cache) = setup();
        platform
            .insert_row(EntityKind::Project, row(serde_json::json!({"id": "A", "title": "a"})))
            .unwrap();
        let epoch = store.epoch();
        store.clear();

        let result = cache.resolve_at(&projects(), epoch).await;
        assert_eq!(result.error, Some(SyncError::SessionChanged));
        assert!(result.ids.is_empty());
        assert!(store.is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_kind() {
        let (_platform, _store, cache) = setup();
        let events = QueryDescriptor::new(EntityKind::Event);
        cache.resolve(&projects()).await;
        cache.resolve(&events).await;

        cache.invalidate(EntityKind::Event);
        assert!(!cache.peek(&projects()).unwrap().stale);
        assert!(cache.peek(&events).unwrap().stale);
    }

    #[tokio::test]
    async fn invalid_row_fails_the_whole_read() {
        let (platform, store, cache) = setup();
        platform
            .insert_row(EntityKind::Event, row(serde_json::json!({
                "id": "E1", "title": "Hack", "event_type": "Hackathon", "date": "2026-11-01"
            })))
            .unwrap();
        platform
            .insert_row(EntityKind::Event, row(serde_json::json!({
                "id": "E2", "title": "Broken", "event_type": "Other", "date": 20261101
            })))
            .unwrap();

        let result = cache.resolve(&QueryDescriptor::new(EntityKind::Event)).await;
        assert!(result.ids.is_empty());
        assert!(matches!(result.error, Some(SyncError::Schema { kind: EntityKind::Event, .. })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn filters_are_evaluated_remotely() {
        let (platform, _store, cache) = setup();
        for (id, event_type) in [("E1", "Hackathon"), ("E2", "Workshop"), ("E3", "Hackathon")] {
            platform
                .insert_row(EntityKind::Event, row(serde_json::json!({
                    "id": id, "title": id, "event_type": event_type, "date": "2026-11-01"
                })))
                .unwrap();
        }
        let hackathons = QueryDescriptor::new(EntityKind::Event)
            .filter(Filter::eq("event_type", Value::from("Hackathon")))
            .sort(SortKey::asc("title"));
        let result = cache.resolve(&hackathons).await;
        assert_eq!(result.ids, vec![EntityId::new("E1"), EntityId::new("E3")]);
    }
}
