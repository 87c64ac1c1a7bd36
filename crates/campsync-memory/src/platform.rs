// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-memory platform adapter.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use campsync_config::model::MemoryPlatformConfig;
use campsync_core::entity::row_fields;
use campsync_core::{
    AdapterType, AuthAdapter, Credentials, DataAdapter, Delta, EntityKind, Fields, HealthStatus,
    Identity, PlatformAdapter, QueryDescriptor, Row, SessionEvent, SignUpRequest, SyncError,
    UserId, WriteAck, WriteTarget,
};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::fixtures;
use crate::tables::{relation, Tables};

const EVENT_CAPACITY: usize = 64;

struct Account {
    identity: Identity,
    password: String,
    metadata: Fields,
}

#[derive(Default)]
struct AuthState {
    /// Keyed by lowercased email.
    accounts: HashMap<String, Account>,
    session: Option<Identity>,
    recent_signups: VecDeque<Instant>,
}

/// Remote platform held entirely in process memory.
pub struct MemoryPlatform {
    config: MemoryPlatformConfig,
    auth: Mutex<AuthState>,
    tables: Mutex<Tables>,
    events: broadcast::Sender<SessionEvent>,
}

impl MemoryPlatform {
    /// Create a platform, seeded with fixtures when the config asks for it.
    pub fn new(config: MemoryPlatformConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let platform = Self {
            config,
            auth: Mutex::new(AuthState::default()),
            tables: Mutex::new(Tables::default()),
            events,
        };
        if platform.config.seed_fixtures {
            fixtures::seed(&platform);
        }
        platform
    }

    /// An unseeded platform with default limits.
    pub fn empty() -> Self {
        Self::new(MemoryPlatformConfig {
            seed_fixtures: false,
            ..MemoryPlatformConfig::default()
        })
    }

    fn auth(&self) -> MutexGuard<'_, AuthState> {
        self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Insert a row directly, bypassing the session check. Server defaults
    /// (`id`, `created_at`) and not-null checks still apply.
    pub fn insert_row(&self, kind: EntityKind, row: Row) -> Result<Row, SyncError> {
        self.tables().insert(kind, row_fields(&row))
    }

    /// Every row of a kind, in insertion order.
    pub fn rows(&self, kind: EntityKind) -> Vec<Row> {
        self.tables().rows(kind)
    }

    /// Create an account without signing it in or counting against the
    /// sign-up limit.
    pub fn register(
        &self,
        user_id: impl Into<String>,
        email: &str,
        password: &str,
        metadata: Fields,
    ) -> Identity {
        let identity = Identity {
            user_id: UserId(user_id.into()),
            email: email.to_string(),
        };
        self.auth().accounts.insert(
            email.to_lowercase(),
            Account {
                identity: identity.clone(),
                password: password.to_string(),
                metadata,
            },
        );
        identity
    }

    /// Metadata stored with an account at sign-up.
    pub fn account_metadata(&self, email: &str) -> Option<Fields> {
        self.auth()
            .accounts
            .get(&email.to_lowercase())
            .map(|a| a.metadata.clone())
    }

    /// End the session as if another client sharing it had signed out.
    pub fn simulate_remote_sign_out(&self) {
        self.auth().session = None;
        info!("remote sign-out");
        self.publish(SessionEvent::SignedOut);
    }

    /// Switch the session to `email`'s account as if another client sharing
    /// it had signed in.
    pub fn simulate_remote_sign_in(&self, email: &str) -> Option<Identity> {
        let identity = {
            let mut auth = self.auth();
            let identity = auth.accounts.get(&email.to_lowercase())?.identity.clone();
            auth.session = Some(identity.clone());
            identity
        };
        info!(user = %identity.user_id, "remote sign-in");
        self.publish(SessionEvent::SignedIn(identity.clone()));
        Some(identity)
    }

    fn invalid_credentials() -> SyncError {
        SyncError::MutationRejected {
            kind: EntityKind::User,
            message: "Invalid login credentials".into(),
        }
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new(MemoryPlatformConfig::default())
    }
}

#[async_trait]
impl PlatformAdapter for MemoryPlatform {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, SyncError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SyncError> {
        Ok(())
    }
}

#[async_trait]
impl AuthAdapter for MemoryPlatform {
    async fn read_session(&self) -> Result<Option<Identity>, SyncError> {
        Ok(self.auth().session.clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, SyncError> {
        let identity = {
            let mut auth = self.auth();
            let account = auth
                .accounts
                .get(&credentials.email.to_lowercase())
                .filter(|a| a.password == credentials.password)
                .ok_or_else(Self::invalid_credentials)?;
            let identity = account.identity.clone();
            auth.session = Some(identity.clone());
            identity
        };
        debug!(user = %identity.user_id, "signed in");
        self.publish(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Identity, SyncError> {
        let email = request.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(SyncError::MutationRejected {
                kind: EntityKind::User,
                message: "Unable to validate email address: invalid format".into(),
            });
        }

        let identity = {
            let mut auth = self.auth();
            let now = Instant::now();
            let window = Duration::from_secs(self.config.signup_window_secs);
            while auth
                .recent_signups
                .front()
                .is_some_and(|at| now.duration_since(*at) >= window)
            {
                auth.recent_signups.pop_front();
            }
            if auth.recent_signups.len() >= self.config.signup_limit_per_window as usize {
                return Err(SyncError::RateLimited {
                    message: "email rate limit exceeded".into(),
                });
            }

            let key = email.to_lowercase();
            if auth.accounts.contains_key(&key) {
                return Err(SyncError::MutationRejected {
                    kind: EntityKind::User,
                    message: "User already registered".into(),
                });
            }
            auth.recent_signups.push_back(now);

            let identity = Identity {
                user_id: UserId(Uuid::new_v4().to_string()),
                email: email.to_string(),
            };
            auth.accounts.insert(
                key,
                Account {
                    identity: identity.clone(),
                    password: request.password.clone(),
                    metadata: request.metadata.clone(),
                },
            );
            auth.session = Some(identity.clone());
            identity
        };
        info!(user = %identity.user_id, "account created");
        self.publish(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), SyncError> {
        self.auth().session = None;
        self.publish(SessionEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataAdapter for MemoryPlatform {
    async fn query(&self, descriptor: &QueryDescriptor) -> Result<Vec<Row>, SyncError> {
        let rows = self.tables().query(descriptor);
        debug!(query = %descriptor, rows = rows.len(), "query");
        Ok(rows)
    }

    async fn write(
        &self,
        kind: EntityKind,
        target: &WriteTarget,
        delta: &Delta,
    ) -> Result<WriteAck, SyncError> {
        if self.auth().session.is_none() {
            return Err(SyncError::MutationRejected {
                kind,
                message: format!("permission denied for table {}", relation(kind)),
            });
        }

        let mut tables = self.tables();
        match (target, delta) {
            (WriteTarget::New, Delta::Patch(fields)) => {
                tables.insert(kind, fields.clone()).map(WriteAck::Row)
            }
            (WriteTarget::New, Delta::Delete) => Err(SyncError::InvalidInput(
                "delete needs an existing row".into(),
            )),
            (WriteTarget::Existing(id), Delta::Patch(fields)) => {
                tables.update(kind, id, fields.clone()).map(WriteAck::Row)
            }
            (WriteTarget::Existing(id), Delta::Delete) => {
                tables.delete(kind, id).map(|()| WriteAck::Deleted)
            }
        }
    }
}
