// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed in-memory entity table: the single source of truth screens render
//! from.
//!
//! Every operation takes the store lock once, so a reader never observes a
//! half-applied merge. The store also carries the bookkeeping the mutation
//! coordinator needs to stay consistent with it:
//!
//! - an **epoch**, bumped by [`EntityStore::clear`], so work started under one
//!   session can tell the store was reset underneath it;
//! - **pins** on keys with an optimistic write in flight, so query results
//!   never overwrite optimistic state;
//! - a **remap** table from local-only identifiers to server identifiers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use campsync_core::{Entity, EntityId, EntityKind, Fields};
use tracing::debug;

type Key = (EntityKind, EntityId);

/// The prior value of one key, captured before an optimistic write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub kind: EntityKind,
    pub id: EntityId,
    pub entity: Option<Entity>,
}

/// Returned when an operation was bound to an epoch the store has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochChanged;

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<EntityKind, BTreeMap<EntityId, Entity>>,
    pins: HashMap<Key, usize>,
    remap: HashMap<Key, EntityId>,
    epoch: u64,
}

impl Inner {
    fn get(&self, kind: EntityKind, id: &EntityId) -> Option<&Entity> {
        self.tables.get(&kind).and_then(|t| t.get(id))
    }

    fn merge(&mut self, kind: EntityKind, id: &EntityId, fields: Fields) -> Entity {
        let table = self.tables.entry(kind).or_default();
        let entity = table
            .entry(id.clone())
            .or_insert_with(|| Entity::new(kind, id.clone(), Fields::new()));
        entity.fields.extend(fields);
        entity.version += 1;
        entity.clone()
    }

    fn replace(&mut self, mut entity: Entity) -> Entity {
        let table = self.tables.entry(entity.kind).or_default();
        let prior = table.get(&entity.id).map(|e| e.version).unwrap_or(0);
        entity.version = prior + 1;
        table.insert(entity.id.clone(), entity.clone());
        entity
    }

    fn remove(&mut self, kind: EntityKind, id: &EntityId) -> Option<Entity> {
        self.tables.get_mut(&kind).and_then(|t| t.remove(id))
    }

    fn restore(&mut self, snapshot: Snapshot) {
        match snapshot.entity {
            Some(entity) => {
                self.tables
                    .entry(snapshot.kind)
                    .or_default()
                    .insert(snapshot.id, entity);
            }
            None => {
                self.remove(snapshot.kind, &snapshot.id);
            }
        }
    }

    fn resolve_id(&self, kind: EntityKind, id: &EntityId) -> EntityId {
        let mut current = id.clone();
        // Remaps never chain back on themselves: a server id is never a
        // local-only id.
        while let Some(next) = self.remap.get(&(kind, current.clone())) {
            current = next.clone();
        }
        current
    }
}

#[derive(Debug, Default)]
pub struct EntityStore {
    inner: RwLock<Inner>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section below leaves `Inner` consistent before it can
    // panic, so a poisoned lock still guards valid state.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, kind: EntityKind, id: &EntityId) -> Option<Entity> {
        self.read().get(kind, id).cloned()
    }

    /// Merge `fields` into the record at `(kind, id)`, inserting it if absent.
    /// Fields not named in `fields` keep their values. Bumps the version.
    pub fn put(&self, kind: EntityKind, id: &EntityId, fields: Fields) -> Entity {
        self.write().merge(kind, id, fields)
    }

    /// Replace the record wholesale. The version continues from any prior
    /// record under the same key.
    pub fn replace(&self, entity: Entity) -> Entity {
        self.write().replace(entity)
    }

    pub fn delete(&self, kind: EntityKind, id: &EntityId) -> Option<Entity> {
        self.write().remove(kind, id)
    }

    /// All entities of a kind, ordered by identifier.
    pub fn list(&self, kind: EntityKind) -> Vec<Entity> {
        self.read()
            .tables
            .get(&kind)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.read().tables.get(&kind).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read().tables.values().all(BTreeMap::is_empty)
    }

    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    /// Drop every entity, pin, and remap, and start a new epoch.
    pub fn clear(&self) -> u64 {
        let mut inner = self.write();
        inner.tables.clear();
        inner.pins.clear();
        inner.remap.clear();
        inner.epoch += 1;
        debug!(epoch = inner.epoch, "entity store cleared");
        inner.epoch
    }

    /// Follow local-only → server identifier remaps.
    pub fn resolve_id(&self, kind: EntityKind, id: &EntityId) -> EntityId {
        self.read().resolve_id(kind, id)
    }

    pub fn is_pinned(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.read().pins.contains_key(&(kind, id.clone()))
    }

    /// Merge rows read from the platform. Keys with an optimistic write in
    /// flight are left alone. Returns [`EpochChanged`] without touching
    /// anything if the store was cleared since `epoch`.
    pub fn merge_remote(&self, epoch: u64, entities: &[Entity]) -> Result<(), EpochChanged> {
        let mut inner = self.write();
        if inner.epoch != epoch {
            return Err(EpochChanged);
        }
        for entity in entities {
            if inner.pins.contains_key(&(entity.kind, entity.id.clone())) {
                debug!(kind = %entity.kind, id = %entity.id, "skipping pinned key");
                continue;
            }
            inner.merge(entity.kind, &entity.id, entity.fields.clone());
        }
        Ok(())
    }

    /// Capture the key's prior value, apply an optimistic change, and pin the
    /// key, all under one lock. `fields = None` deletes.
    pub fn apply_optimistic(
        &self,
        epoch: u64,
        kind: EntityKind,
        id: &EntityId,
        fields: Option<Fields>,
    ) -> Result<Snapshot, EpochChanged> {
        let mut inner = self.write();
        if inner.epoch != epoch {
            return Err(EpochChanged);
        }
        let snapshot = Snapshot {
            kind,
            id: id.clone(),
            entity: inner.get(kind, id).cloned(),
        };
        match fields {
            Some(fields) => {
                inner.merge(kind, id, fields);
            }
            None => {
                inner.remove(kind, id);
            }
        }
        *inner.pins.entry((kind, id.clone())).or_insert(0) += 1;
        Ok(snapshot)
    }

    /// Fold an authoritative write result into the store, replacing the
    /// optimistic record at `local_id`. When the server assigned a different
    /// identifier the local key is removed and a remap recorded.
    pub fn commit(
        &self,
        epoch: u64,
        kind: EntityKind,
        local_id: &EntityId,
        authoritative: Option<Entity>,
    ) -> Result<Option<Entity>, EpochChanged> {
        let mut inner = self.write();
        if inner.epoch != epoch {
            return Err(EpochChanged);
        }
        Self::unpin_locked(&mut inner, kind, local_id);
        match authoritative {
            Some(entity) => {
                if entity.id != *local_id {
                    inner.remove(kind, local_id);
                    inner
                        .remap
                        .insert((kind, local_id.clone()), entity.id.clone());
                }
                Ok(Some(inner.replace(entity)))
            }
            None => {
                inner.remove(kind, local_id);
                Ok(None)
            }
        }
    }

    /// Put back the value captured by [`EntityStore::apply_optimistic`],
    /// exactly, version included.
    pub fn rollback(&self, epoch: u64, snapshot: Snapshot) -> Result<(), EpochChanged> {
        let mut inner = self.write();
        if inner.epoch != epoch {
            return Err(EpochChanged);
        }
        Self::unpin_locked(&mut inner, snapshot.kind, &snapshot.id);
        inner.restore(snapshot);
        Ok(())
    }

    fn unpin_locked(inner: &mut Inner, kind: EntityKind, id: &EntityId) {
        let key = (kind, id.clone());
        if let Some(count) = inner.pins.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                inner.pins.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campsync_core::{fields, Value};
    use proptest::prelude::*;

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    #[test]
    fn put_merges_and_bumps_version() {
        let store = EntityStore::new();
        store.put(EntityKind::Project, &id("P1"), fields! { "title" => "X" });
        let merged = store.put(
            EntityKind::Project,
            &id("P1"),
            fields! { "looking_for" => "designers" },
        );
        assert_eq!(merged.version, 2);
        assert_eq!(merged.text("title"), Some("X"));
        assert_eq!(merged.text("looking_for"), Some("designers"));
    }

    #[test]
    fn kinds_do_not_share_keys() {
        let store = EntityStore::new();
        store.put(EntityKind::Project, &id("1"), fields! { "title" => "p" });
        store.put(EntityKind::Event, &id("1"), fields! { "title" => "e" });
        assert_eq!(store.len(EntityKind::Project), 1);
        assert_eq!(store.len(EntityKind::Event), 1);
        assert_eq!(
            store.get(EntityKind::Event, &id("1")).unwrap().text("title"),
            Some("e")
        );
    }

    #[test]
    fn rollback_restores_exact_prior_state() {
        let store = EntityStore::new();
        let before = store.put(EntityKind::Project, &id("P1"), fields! { "title" => "X" });
        let epoch = store.epoch();

        let snapshot = store
            .apply_optimistic(epoch, EntityKind::Project, &id("P1"), Some(fields! { "title" => "Y" }))
            .unwrap();
        assert!(store.is_pinned(EntityKind::Project, &id("P1")));
        assert_eq!(
            store.get(EntityKind::Project, &id("P1")).unwrap().text("title"),
            Some("Y")
        );

        store.rollback(epoch, snapshot).unwrap();
        assert_eq!(store.get(EntityKind::Project, &id("P1")), Some(before));
        assert!(!store.is_pinned(EntityKind::Project, &id("P1")));
    }

    #[test]
    fn rollback_of_insert_removes_key() {
        let store = EntityStore::new();
        let epoch = store.epoch();
        let snapshot = store
            .apply_optimistic(epoch, EntityKind::Project, &id("local-1"), Some(fields! { "title" => "X" }))
            .unwrap();
        store.rollback(epoch, snapshot).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn commit_remaps_local_id() {
        let store = EntityStore::new();
        let epoch = store.epoch();
        store
            .apply_optimistic(epoch, EntityKind::Project, &id("local-1"), Some(fields! { "title" => "X" }))
            .unwrap();
        let server = Entity::new(EntityKind::Project, "P1", fields! { "title" => "X" });
        store
            .commit(epoch, EntityKind::Project, &id("local-1"), Some(server))
            .unwrap();

        assert_eq!(store.len(EntityKind::Project), 1);
        assert!(store.get(EntityKind::Project, &id("local-1")).is_none());
        assert_eq!(store.resolve_id(EntityKind::Project, &id("local-1")), id("P1"));
        assert!(!store.is_pinned(EntityKind::Project, &id("local-1")));
    }

    #[test]
    fn pinned_keys_are_not_overwritten_by_reads() {
        let store = EntityStore::new();
        let epoch = store.epoch();
        store
            .apply_optimistic(epoch, EntityKind::Project, &id("P1"), Some(fields! { "title" => "mine" }))
            .unwrap();
        let remote = Entity::new(EntityKind::Project, "P1", fields! { "title" => "theirs" });
        store.merge_remote(epoch, &[remote]).unwrap();
        assert_eq!(
            store.get(EntityKind::Project, &id("P1")).unwrap().text("title"),
            Some("mine")
        );
    }

    #[test]
    fn operations_bound_to_an_old_epoch_are_refused() {
        let store = EntityStore::new();
        let epoch = store.epoch();
        let snapshot = store
            .apply_optimistic(epoch, EntityKind::Project, &id("P1"), Some(fields! { "title" => "X" }))
            .unwrap();
        store.clear();

        assert_eq!(store.rollback(epoch, snapshot), Err(EpochChanged));
        let server = Entity::new(EntityKind::Project, "P1", Fields::new());
        assert_eq!(
            store.commit(epoch, EntityKind::Project, &id("P1"), Some(server.clone())),
            Err(EpochChanged)
        );
        assert_eq!(store.merge_remote(epoch, &[server]), Err(EpochChanged));
        assert!(store.is_empty());
    }

    proptest! {
        /// For one key, the final state is the field-wise union of every put,
        /// each field holding the value from the last put that named it.
        #[test]
        fn puts_merge_field_by_field(
            writes in proptest::collection::vec(
                proptest::collection::btree_map("[a-e]", 0i64..100, 0..4),
                1..12,
            )
        ) {
            let store = EntityStore::new();
            let key = id("K");
            let mut expected = Fields::new();
            for write in &writes {
                let fields: Fields = write
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::Int(*v)))
                    .collect();
                expected.extend(fields.clone());
                store.put(EntityKind::Event, &key, fields);
            }
            let stored = store.get(EntityKind::Event, &key).unwrap();
            prop_assert_eq!(stored.fields, expected);
            prop_assert_eq!(stored.version, writes.len() as u64);
        }
    }
}
