// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic writes with commit/rollback reconciliation.
//!
//! A mutation applies its delta to the entity store before the remote write
//! is issued, then either folds the authoritative row into the store or puts
//! the key back exactly as it was. Mutations against the same key run one
//! at a time, in the order they were issued; later ones wait in a queue and
//! apply their optimistic change only when they reach the front.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use campsync_core::{
    Delta, Entity, EntityId, EntityKind, Fields, Platform, SyncError, Value, WriteAck,
    WriteTarget,
};
use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::query_cache::QueryCache;
use crate::schema;
use crate::store::{EntityStore, Snapshot};

type Key = (EntityKind, EntityId);
type Outcome = Result<Option<Entity>, SyncError>;

/// Lifecycle of one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState {
    /// Waiting behind an earlier mutation of the same key. Nothing has been
    /// applied to the store yet.
    Queued,
    /// Applied optimistically; the remote write is in flight.
    Pending,
    /// The remote write succeeded. `id` is the authoritative identifier,
    /// which differs from the local one for inserts.
    Committed { id: EntityId },
    /// The remote write failed and the store was restored.
    RolledBack,
    /// The session ended before the write resolved; its result was dropped.
    Discarded,
}

impl MutationState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, MutationState::Queued | MutationState::Pending)
    }
}

/// Caller's view of a mutation in flight.
#[derive(Debug)]
pub struct MutationHandle {
    id: Uuid,
    kind: EntityKind,
    target: EntityId,
    issued_at: DateTime<Utc>,
    state: watch::Receiver<MutationState>,
    outcome: oneshot::Receiver<Outcome>,
}

impl MutationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The key the optimistic change was written under. For inserts without
    /// a caller-supplied `id` this is a local-only identifier.
    pub fn target(&self) -> &EntityId {
        &self.target
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn state(&self) -> MutationState {
        self.state.borrow().clone()
    }

    /// Watch state changes. Outlives the handle, so the final state can be
    /// read after [`MutationHandle::wait`].
    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.state.clone()
    }

    /// Wait for the mutation to settle. Returns the authoritative entity,
    /// `None` for deletes, or the failure that caused the rollback.
    pub async fn wait(self) -> Outcome {
        self.outcome.await.unwrap_or_else(|_| {
            Err(SyncError::Internal("mutation task ended without a result".into()))
        })
    }
}

struct Reporter {
    mutation_id: Uuid,
    state: watch::Sender<MutationState>,
    outcome: oneshot::Sender<Outcome>,
}

impl Reporter {
    fn settle(self, state: MutationState, outcome: Outcome) {
        self.state.send_replace(state);
        // The caller may have dropped the handle.
        let _ = self.outcome.send(outcome);
    }
}

pub struct MutationCoordinator {
    platform: Arc<dyn Platform>,
    store: Arc<EntityStore>,
    cache: Arc<QueryCache>,
    locks: Mutex<HashMap<Key, Arc<tokio::sync::Mutex<()>>>>,
    temp_id_prefix: String,
    pending: AtomicUsize,
}

impl MutationCoordinator {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Arc<EntityStore>,
        cache: Arc<QueryCache>,
        temp_id_prefix: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            store,
            cache,
            locks: Mutex::new(HashMap::new()),
            temp_id_prefix: temp_id_prefix.into(),
            pending: AtomicUsize::new(0),
        }
    }

    /// Mutations issued and not yet settled, queued ones included.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<Key, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_lock(&self, key: &Key) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks().entry(key.clone()).or_default())
    }

    /// Forget the key's lock once nobody holds or waits on it.
    fn release(&self, key: &Key, guard: OwnedMutexGuard<()>) {
        drop(guard);
        let mut locks = self.locks();
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    /// Issue a mutation bound to the store epoch `epoch`.
    ///
    /// If no other mutation of the same key is in flight the delta is applied
    /// to the store before this returns; otherwise the mutation is queued.
    /// Either way the remote write runs on a background task.
    pub fn mutate(
        self: &Arc<Self>,
        epoch: u64,
        kind: EntityKind,
        target: WriteTarget,
        delta: Delta,
    ) -> Result<MutationHandle, SyncError> {
        let (is_insert, local_id) = match &target {
            WriteTarget::New => {
                if delta == Delta::Delete {
                    return Err(SyncError::InvalidInput(
                        "cannot delete a record that does not exist yet".into(),
                    ));
                }
                // A caller-chosen identifier (a profile keyed by its user id,
                // say) is used as the local key directly.
                let id = match &delta {
                    Delta::Patch(fields) => fields.get("id").and_then(Value::as_str),
                    Delta::Delete => None,
                }
                .map(EntityId::new)
                .unwrap_or_else(|| {
                    EntityId::new(format!("{}{}", self.temp_id_prefix, Uuid::new_v4()))
                });
                (true, id)
            }
            WriteTarget::Existing(id) => (false, self.store.resolve_id(kind, id)),
        };

        let mutation_id = Uuid::new_v4();
        let key = (kind, local_id.clone());
        let lock = self.key_lock(&key);
        let (state_tx, state_rx) = watch::channel(MutationState::Queued);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let reporter = Reporter {
            mutation_id,
            state: state_tx,
            outcome: outcome_tx,
        };

        match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => {
                let snapshot = match self.store.apply_optimistic(
                    epoch,
                    kind,
                    &local_id,
                    optimistic_fields(&delta),
                ) {
                    Ok(snapshot) => snapshot,
                    Err(_) => {
                        self.release(&key, guard);
                        return Err(SyncError::SessionChanged);
                    }
                };
                reporter.state.send_replace(MutationState::Pending);
                debug!(%mutation_id, kind = %kind, id = %local_id, "applied optimistic mutation");
                self.pending.fetch_add(1, Ordering::SeqCst);
                let coordinator = Arc::clone(self);
                tokio::spawn(async move {
                    coordinator
                        .write(epoch, is_insert, key, guard, snapshot, delta, reporter)
                        .await;
                });
            }
            Err(_) => {
                debug!(%mutation_id, kind = %kind, id = %local_id, "queued behind pending mutation");
                self.pending.fetch_add(1, Ordering::SeqCst);
                let coordinator = Arc::clone(self);
                tokio::spawn(async move {
                    coordinator
                        .run_queued(epoch, key, lock, delta, reporter)
                        .await;
                });
            }
        }

        Ok(MutationHandle {
            id: mutation_id,
            kind,
            target: local_id,
            issued_at: Utc::now(),
            state: state_rx,
            outcome: outcome_rx,
        })
    }

    async fn run_queued(
        self: Arc<Self>,
        epoch: u64,
        mut key: Key,
        mut lock: Arc<tokio::sync::Mutex<()>>,
        delta: Delta,
        reporter: Reporter,
    ) {
        let guard = loop {
            let guard = lock.lock_owned().await;
            // The mutation ahead may have been an insert that has since been
            // given its server identifier.
            let resolved = self.store.resolve_id(key.0, &key.1);
            if resolved == key.1 {
                break guard;
            }
            debug!(mutation_id = %reporter.mutation_id, from = %key.1, to = %resolved, "following remapped id");
            self.release(&key, guard);
            key = (key.0, resolved);
            lock = self.key_lock(&key);
        };

        let (kind, id) = (key.0, key.1.clone());
        let snapshot = match self
            .store
            .apply_optimistic(epoch, kind, &id, optimistic_fields(&delta))
        {
            Ok(snapshot) => snapshot,
            Err(_) => {
                warn!(mutation_id = %reporter.mutation_id, kind = %kind, id = %id, "session ended while queued, discarding mutation");
                self.release(&key, guard);
                self.pending.fetch_sub(1, Ordering::SeqCst);
                reporter.settle(MutationState::Discarded, Err(SyncError::SessionChanged));
                return;
            }
        };
        reporter.state.send_replace(MutationState::Pending);
        debug!(mutation_id = %reporter.mutation_id, kind = %kind, id = %id, "applied queued mutation");
        self.write(epoch, false, key, guard, snapshot, delta, reporter)
            .await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn write(
        &self,
        epoch: u64,
        is_insert: bool,
        key: Key,
        guard: OwnedMutexGuard<()>,
        snapshot: Snapshot,
        delta: Delta,
        reporter: Reporter,
    ) {
        let (kind, local_id) = (key.0, key.1.clone());
        let mutation_id = reporter.mutation_id;
        let target = if is_insert {
            WriteTarget::New
        } else {
            WriteTarget::Existing(local_id.clone())
        };

        debug!(%mutation_id, kind = %kind, id = %local_id, "remote write");
        let result = self
            .platform
            .write(kind, &target, &delta)
            .await
            .map_err(|e| classify_write_error(kind, e))
            .and_then(|ack| match ack {
                WriteAck::Row(row) => schema::validate(kind, &row).map(Some),
                WriteAck::Deleted => Ok(None),
            });

        let (state, outcome) = match result {
            Ok(authoritative) => match self.store.commit(epoch, kind, &local_id, authoritative) {
                Ok(entity) => {
                    let id = entity
                        .as_ref()
                        .map(|e| e.id.clone())
                        .unwrap_or_else(|| local_id.clone());
                    debug!(%mutation_id, kind = %kind, id = %id, "mutation committed");
                    self.cache.invalidate(kind);
                    (MutationState::Committed { id }, Ok(entity))
                }
                Err(_) => {
                    warn!(%mutation_id, kind = %kind, id = %local_id, "session ended before write resolved, discarding result");
                    (MutationState::Discarded, Err(SyncError::SessionChanged))
                }
            },
            Err(error) => match self.store.rollback(epoch, snapshot) {
                Ok(()) => {
                    warn!(%mutation_id, kind = %kind, id = %local_id, error = %error, "mutation rolled back");
                    if matches!(error, SyncError::Schema { .. }) {
                        // The write may have landed even though its row
                        // could not be read back.
                        self.cache.invalidate(kind);
                    }
                    (MutationState::RolledBack, Err(error))
                }
                Err(_) => {
                    warn!(%mutation_id, kind = %kind, id = %local_id, "session ended before write failed, discarding result");
                    (MutationState::Discarded, Err(SyncError::SessionChanged))
                }
            },
        };

        // Settle before releasing the key so a queued mutation never observes
        // this one as still pending.
        self.pending.fetch_sub(1, Ordering::SeqCst);
        reporter.settle(state, outcome);
        self.release(&key, guard);
    }
}

fn optimistic_fields(delta: &Delta) -> Option<Fields> {
    match delta {
        Delta::Patch(fields) => {
            let mut fields = fields.clone();
            fields.remove("id");
            Some(fields)
        }
        Delta::Delete => None,
    }
}

/// Write failures surface as [`SyncError::MutationRejected`] unless the
/// platform already classified them.
fn classify_write_error(kind: EntityKind, error: SyncError) -> SyncError {
    match error {
        SyncError::MutationRejected { .. }
        | SyncError::RateLimited { .. }
        | SyncError::Schema { .. }
        | SyncError::InvalidInput(_)
        | SyncError::SessionChanged
        | SyncError::Unauthenticated => error,
        other => SyncError::MutationRejected {
            kind,
            message: other.to_string(),
        },
    }
}
