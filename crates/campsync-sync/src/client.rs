// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`SyncClient`]: the four sync components wired together.
//!
//! Screens receive a `SyncClient` explicitly; there is no process-wide
//! instance. Every read and write goes through the session gate first, so it
//! suspends while a session check is in flight and fails with
//! [`SyncError::Unauthenticated`] when nobody is signed in.

use std::sync::Arc;
use std::time::Duration;

use campsync_config::SyncConfig;
use campsync_core::{
    Delta, Entity, EntityId, EntityKind, Fields, Identity, Platform, QueryDescriptor, SyncError,
    WriteTarget,
};
use serde::de::DeserializeOwned;

use crate::mutation::{MutationCoordinator, MutationHandle};
use crate::query_cache::{QueryCache, QueryResult};
use crate::session::SessionGate;
use crate::store::EntityStore;

pub struct SyncClient {
    config: SyncConfig,
    platform: Arc<dyn Platform>,
    store: Arc<EntityStore>,
    cache: Arc<QueryCache>,
    mutations: Arc<MutationCoordinator>,
    session: Arc<SessionGate>,
}

impl SyncClient {
    /// Build a client without checking for an existing session. The gate
    /// stays `Unknown` until [`SessionGate::start`] is called.
    pub fn new(config: SyncConfig, platform: Arc<dyn Platform>) -> Self {
        let store = Arc::new(EntityStore::new());
        let cache = Arc::new(QueryCache::new(
            Arc::clone(&platform),
            Arc::clone(&store),
            config.cache.max_age_secs.map(Duration::from_secs),
        ));
        let mutations = Arc::new(MutationCoordinator::new(
            Arc::clone(&platform),
            Arc::clone(&store),
            Arc::clone(&cache),
            config.mutation.temp_id_prefix.clone(),
        ));
        let session = Arc::new(SessionGate::new(
            Arc::clone(&platform),
            Arc::clone(&store),
            Arc::clone(&cache),
        ));
        Self {
            config,
            platform,
            store,
            cache,
            mutations,
            session,
        }
    }

    /// Build a client and run the initial session check.
    pub async fn connect(config: SyncConfig, platform: Arc<dyn Platform>) -> Result<Self, SyncError> {
        let client = Self::new(config, platform);
        client.session.start().await?;
        Ok(client)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn mutations(&self) -> &Arc<MutationCoordinator> {
        &self.mutations
    }

    pub fn session(&self) -> &Arc<SessionGate> {
        &self.session
    }

    pub async fn identity(&self) -> Result<Identity, SyncError> {
        self.session.identity().await
    }

    /// Resolve a query through the cache as the signed-in user. A session
    /// change between the session check and the read yields
    /// [`SyncError::SessionChanged`] in the result.
    pub async fn query(&self, descriptor: &QueryDescriptor) -> Result<QueryResult, SyncError> {
        let (_, epoch) = self.session.session().await?;
        Ok(self.cache.resolve_at(descriptor, epoch).await)
    }

    /// Resolve a query and materialize its entities.
    ///
    /// A failed read is an error only when there is no earlier result to fall
    /// back on; otherwise the earlier entities are returned.
    pub async fn fetch(&self, descriptor: &QueryDescriptor) -> Result<Vec<Entity>, SyncError> {
        let result = self.query(descriptor).await?;
        if let Some(error) = &result.error {
            if result.resolved_at.is_none() {
                return Err(error.clone());
            }
        }
        Ok(self.cache.entities(&result))
    }

    /// [`SyncClient::fetch`], decoded into typed records.
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<T>, SyncError> {
        self.fetch(descriptor)
            .await?
            .iter()
            .map(Entity::decode::<T>)
            .collect()
    }

    /// Issue an optimistic mutation as the signed-in user.
    pub async fn mutate(
        &self,
        kind: EntityKind,
        target: WriteTarget,
        delta: Delta,
    ) -> Result<MutationHandle, SyncError> {
        let (_, epoch) = self.session.session().await?;
        self.mutations.mutate(epoch, kind, target, delta)
    }

    /// Insert and wait for the authoritative record.
    pub async fn insert(&self, kind: EntityKind, fields: Fields) -> Result<Entity, SyncError> {
        self.mutate(kind, WriteTarget::New, Delta::Patch(fields))
            .await?
            .wait()
            .await?
            .ok_or_else(|| SyncError::Internal(format!("{kind} insert returned no row")))
    }

    /// Patch an existing record and wait for the authoritative record.
    pub async fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        fields: Fields,
    ) -> Result<Entity, SyncError> {
        self.mutate(kind, WriteTarget::Existing(id.clone()), Delta::Patch(fields))
            .await?
            .wait()
            .await?
            .ok_or_else(|| SyncError::Internal(format!("{kind} update returned no row")))
    }

    pub async fn remove(&self, kind: EntityKind, id: &EntityId) -> Result<(), SyncError> {
        self.mutate(kind, WriteTarget::Existing(id.clone()), Delta::Delete)
            .await?
            .wait()
            .await
            .map(|_| ())
    }
}
