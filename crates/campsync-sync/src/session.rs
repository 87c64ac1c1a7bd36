// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session gate: the authenticated identity and its lifecycle.
//!
//! States: Unknown -> Loading -> {Authenticated, Unauthenticated}. Sign-in,
//! sign-up, sign-out, and out-of-band session events pushed by the platform
//! re-drive the same transitions from any state.
//!
//! Whenever the signed-in user changes (including signing out) the entity
//! store and the query cache are reset, so no record read under one identity
//! is ever served to another.
//!
//! Platform session events are treated as hints. The listener re-reads the
//! platform session and applies what it finds, and only if the gate has not
//! transitioned in the meantime. An event caused by the gate's own sign-out
//! or sign-in therefore never undoes a later local transition.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use campsync_core::{
    Credentials, Identity, Platform, SessionEvent, SignUpRequest, SyncError, UserId,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::query_cache::QueryCache;
use crate::store::EntityStore;

/// States in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Before the first session check.
    Unknown,
    /// A session check, sign-in, or sign-up is in flight.
    Loading,
    Authenticated(Identity),
    Unauthenticated,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticated(_) | SessionState::Unauthenticated
        )
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unknown => write!(f, "unknown"),
            SessionState::Loading => write!(f, "loading"),
            SessionState::Authenticated(identity) => {
                write!(f, "authenticated({})", identity.user_id)
            }
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

#[derive(Default)]
struct Active {
    /// User whose data the store currently holds.
    user: Option<UserId>,
    /// Bumped by every transition.
    generation: u64,
}

pub struct SessionGate {
    platform: Arc<dyn Platform>,
    store: Arc<EntityStore>,
    cache: Arc<QueryCache>,
    state: watch::Sender<SessionState>,
    /// Guarded together with the state publish so `session()` never pairs
    /// one user with another's epoch.
    active: Mutex<Active>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionGate {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Arc<EntityStore>,
        cache: Arc<QueryCache>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            platform,
            store,
            cache,
            state,
            active: Mutex::new(Active::default()),
            listener: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Active> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to platform session events, then check for an existing
    /// session. A failed check leaves the gate unauthenticated.
    pub async fn start(self: &Arc<Self>) -> Result<(), SyncError> {
        let events = self.platform.subscribe();
        let listener = tokio::spawn(listen(Arc::downgrade(self), events));
        if let Some(previous) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(listener)
        {
            previous.abort();
        }

        self.transition(SessionState::Loading);
        self.refresh().await
    }

    async fn refresh(&self) -> Result<(), SyncError> {
        match self.platform.read_session().await {
            Ok(Some(identity)) => {
                self.transition(SessionState::Authenticated(identity));
                Ok(())
            }
            Ok(None) => {
                self.transition(SessionState::Unauthenticated);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "session check failed");
                self.transition(SessionState::Unauthenticated);
                Err(match e {
                    SyncError::SessionUnavailable { .. } => e,
                    other => SyncError::SessionUnavailable {
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    fn transition(&self, next: SessionState) {
        let mut active = self.active();
        self.apply(&mut active, next);
    }

    /// Transition only if nothing else has since `generation`. Returns
    /// whether the transition was applied.
    fn transition_from(&self, generation: u64, next: SessionState) -> bool {
        let mut active = self.active();
        if active.generation != generation {
            return false;
        }
        self.apply(&mut active, next);
        true
    }

    fn generation(&self) -> u64 {
        self.active().generation
    }

    fn apply(&self, active: &mut Active, next: SessionState) {
        active.generation += 1;
        let previous = self.state.send_replace(next.clone());
        if previous != next {
            info!(from = %previous, to = %next, "session transition");
        }
        if !next.is_terminal() {
            return;
        }
        let next_user = next.identity().map(|i| i.user_id.clone());
        if active.user != next_user {
            self.store.clear();
            self.cache.clear();
            debug!(user = ?next_user, "reset store and cache for new session");
            active.user = next_user;
        }
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, SyncError> {
        let previous = self.current();
        self.transition(SessionState::Loading);
        match self.platform.sign_in(credentials).await {
            Ok(identity) => {
                self.transition(SessionState::Authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "sign-in failed");
                self.restore(previous);
                Err(e)
            }
        }
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<Identity, SyncError> {
        let previous = self.current();
        self.transition(SessionState::Loading);
        match self.platform.sign_up(request).await {
            Ok(identity) => {
                self.transition(SessionState::Authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "sign-up failed");
                self.restore(previous);
                Err(e)
            }
        }
    }

    fn restore(&self, previous: SessionState) {
        let next = if previous.is_terminal() {
            previous
        } else {
            SessionState::Unauthenticated
        };
        self.transition(next);
    }

    /// Sign out. The local session ends even when the platform call fails;
    /// that failure is still returned.
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        let result = self.platform.sign_out().await;
        if let Err(e) = &result {
            warn!(error = %e, "platform sign-out failed, ending local session anyway");
        }
        self.transition(SessionState::Unauthenticated);
        result
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until the gate is out of `Unknown`/`Loading`, then return the
    /// signed-in identity.
    pub async fn identity(&self) -> Result<Identity, SyncError> {
        self.session().await.map(|(identity, _)| identity)
    }

    /// Like [`SessionGate::identity`], also returning the store epoch that
    /// belongs to that identity. Work bound to the epoch is discarded if the
    /// session changes before it completes.
    pub async fn session(&self) -> Result<(Identity, u64), SyncError> {
        let mut rx = self.state.subscribe();
        loop {
            rx.wait_for(SessionState::is_terminal)
                .await
                .map_err(|_| SyncError::Internal("session gate dropped".into()))?;
            let (state, epoch) = {
                let _active = self.active();
                (self.current(), self.store.epoch())
            };
            match state {
                SessionState::Authenticated(identity) => return Ok((identity, epoch)),
                SessionState::Unauthenticated => return Err(SyncError::Unauthenticated),
                // Changed between the wait and the lock.
                _ => continue,
            }
        }
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        if let Some(listener) = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
    }
}

/// Re-read the platform session after an event, and apply it unless the
/// gate moved on while the read was in flight.
async fn resync(gate: &SessionGate) {
    let generation = gate.generation();
    let next = match gate.platform.read_session().await {
        Ok(Some(identity)) => SessionState::Authenticated(identity),
        Ok(None) => SessionState::Unauthenticated,
        Err(e) => {
            warn!(error = %e, "session re-check failed, keeping current state");
            return;
        }
    };
    if !gate.transition_from(generation, next) {
        debug!("session changed locally during re-check, ignoring result");
    }
}

async fn listen(gate: Weak<SessionGate>, mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        let event = events.recv().await;
        let Some(gate) = gate.upgrade() else {
            break;
        };
        match event {
            Ok(SessionEvent::SignedIn(identity)) | Ok(SessionEvent::UserUpdated(identity)) => {
                debug!(user = %identity.user_id, "platform reported session");
            }
            Ok(SessionEvent::SignedOut) => {
                debug!("platform reported sign-out");
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "missed session events");
            }
            Err(RecvError::Closed) => break,
        }
        resync(&gate).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campsync_core::{fields, AuthAdapter, EntityKind, Fields};
    use campsync_memory::MemoryPlatform;

    fn gate(platform: Arc<MemoryPlatform>) -> (Arc<SessionGate>, Arc<EntityStore>) {
        let store = Arc::new(EntityStore::new());
        let cache = Arc::new(QueryCache::new(platform.clone(), store.clone(), None));
        (Arc::new(SessionGate::new(platform, store.clone(), cache)), store)
    }

    fn signup(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.into(),
            password: "secret".into(),
            metadata: Fields::new(),
        }
    }

    #[tokio::test]
    async fn start_without_session_is_unauthenticated() {
        let (gate, _) = gate(Arc::new(MemoryPlatform::empty()));
        assert_eq!(gate.current(), SessionState::Unknown);
        gate.start().await.unwrap();
        assert_eq!(gate.current(), SessionState::Unauthenticated);
        assert_eq!(gate.identity().await, Err(SyncError::Unauthenticated));
    }

    #[tokio::test]
    async fn start_picks_up_existing_session() {
        let platform = Arc::new(MemoryPlatform::empty());
        let identity = platform.sign_up(&signup("u1@campus.edu")).await.unwrap();
        let (gate, _) = gate(platform);
        gate.start().await.unwrap();
        assert_eq!(gate.identity().await.unwrap(), identity);
    }

    #[tokio::test]
    async fn sign_out_resets_store() {
        let (gate, store) = gate(Arc::new(MemoryPlatform::empty()));
        gate.start().await.unwrap();
        gate.sign_up(&signup("u1@campus.edu")).await.unwrap();
        store.put(EntityKind::Project, &"P1".into(), fields! { "title" => "X" });
        let epoch = store.epoch();

        gate.sign_out().await.unwrap();
        assert_eq!(gate.current(), SessionState::Unauthenticated);
        assert!(store.is_empty());
        assert!(store.epoch() > epoch);
    }

    #[tokio::test]
    async fn failed_sign_in_restores_previous_state() {
        let (gate, _) = gate(Arc::new(MemoryPlatform::empty()));
        gate.start().await.unwrap();
        let identity = gate.sign_up(&signup("u1@campus.edu")).await.unwrap();

        let err = gate
            .sign_in(&Credentials {
                email: "u1@campus.edu".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(gate.current(), SessionState::Authenticated(identity));
    }

    #[tokio::test]
    async fn stale_sign_out_event_does_not_end_new_session() {
        let (gate, store) = gate(Arc::new(MemoryPlatform::empty()));
        gate.start().await.unwrap();
        let identity = gate.sign_up(&signup("u1@campus.edu")).await.unwrap();
        gate.sign_out().await.unwrap();
        gate.sign_in(&Credentials {
            email: "u1@campus.edu".into(),
            password: "secret".into(),
        })
        .await
        .unwrap();
        store.put(EntityKind::Project, &"P1".into(), fields! { "title" => "X" });
        let epoch = store.epoch();

        // Let the listener drain the queued sign-up, sign-out and sign-in
        // events.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gate.current(), SessionState::Authenticated(identity));
        assert_eq!(store.epoch(), epoch);
        assert_eq!(store.len(EntityKind::Project), 1);
    }

    #[tokio::test]
    async fn identity_waits_while_loading() {
        let (gate, _) = gate(Arc::new(MemoryPlatform::empty()));
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.identity().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.start().await.unwrap();
        assert_eq!(waiter.await.unwrap(), Err(SyncError::Unauthenticated));
    }
}
