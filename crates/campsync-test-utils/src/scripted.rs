// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable platform adapter for deterministic testing.
//!
//! `ScriptedPlatform` wraps a [`MemoryPlatform`] and lets a test fail the
//! next reads or writes, replace the next write acknowledgement, and hold
//! reads or writes in flight until released. Every call is counted.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch, Mutex};

use campsync_core::{
    AdapterType, AuthAdapter, Credentials, DataAdapter, Delta, EntityKind, HealthStatus,
    Identity, PlatformAdapter, QueryDescriptor, Row, SessionEvent, SignUpRequest, SyncError,
    WriteAck, WriteTarget,
};
use campsync_memory::MemoryPlatform;
use tracing::debug;

#[derive(Default)]
struct Script {
    session_failures: VecDeque<SyncError>,
    read_failures: VecDeque<SyncError>,
    write_failures: VecDeque<SyncError>,
    write_acks: VecDeque<WriteAck>,
}

/// Counter that tests can wait on.
struct Counter(watch::Sender<usize>);

impl Counter {
    fn new() -> Self {
        Self(watch::channel(0).0)
    }

    fn bump(&self) {
        self.0.send_modify(|n| *n += 1);
    }

    fn get(&self) -> usize {
        *self.0.borrow()
    }

    async fn wait_for(&self, n: usize) {
        let mut rx = self.0.subscribe();
        // The sender lives as long as `self`.
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

/// Gate that holds calls while closed.
struct Hold(watch::Sender<bool>);

impl Hold {
    fn new() -> Self {
        Self(watch::channel(false).0)
    }

    fn set(&self, held: bool) {
        self.0.send_replace(held);
    }

    async fn pass(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|held| !*held).await;
    }
}

pub struct ScriptedPlatform {
    inner: Arc<MemoryPlatform>,
    script: Mutex<Script>,
    reads: Counter,
    writes: Counter,
    hold_reads: Hold,
    hold_writes: Hold,
}

impl ScriptedPlatform {
    pub fn new(inner: MemoryPlatform) -> Self {
        Self {
            inner: Arc::new(inner),
            script: Mutex::new(Script::default()),
            reads: Counter::new(),
            writes: Counter::new(),
            hold_reads: Hold::new(),
            hold_writes: Hold::new(),
        }
    }

    /// An unseeded platform with default limits.
    pub fn empty() -> Self {
        Self::new(MemoryPlatform::empty())
    }

    /// The wrapped platform, for direct inspection and seeding.
    pub fn inner(&self) -> &MemoryPlatform {
        &self.inner
    }

    /// Remote reads issued so far.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    /// Remote writes issued so far, held ones included.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Wait until at least `n` reads have reached the platform.
    pub async fn wait_for_reads(&self, n: usize) {
        self.reads.wait_for(n).await;
    }

    /// Wait until at least `n` writes have reached the platform.
    pub async fn wait_for_writes(&self, n: usize) {
        self.writes.wait_for(n).await;
    }

    pub async fn fail_next_session_read(&self, error: SyncError) {
        self.script.lock().await.session_failures.push_back(error);
    }

    pub async fn fail_next_read(&self, error: SyncError) {
        self.script.lock().await.read_failures.push_back(error);
    }

    pub async fn fail_next_write(&self, error: SyncError) {
        self.script.lock().await.write_failures.push_back(error);
    }

    /// Answer the next write with `ack` instead of applying it.
    pub async fn override_next_write(&self, ack: WriteAck) {
        self.script.lock().await.write_acks.push_back(ack);
    }

    /// Hold every read at the platform boundary until [`Self::release_reads`].
    pub fn hold_reads(&self) {
        self.hold_reads.set(true);
    }

    pub fn release_reads(&self) {
        self.hold_reads.set(false);
    }

    /// Hold every write at the platform boundary until [`Self::release_writes`].
    pub fn hold_writes(&self) {
        self.hold_writes.set(true);
    }

    pub fn release_writes(&self) {
        self.hold_writes.set(false);
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedPlatform {
    fn name(&self) -> &str {
        "scripted"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, SyncError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), SyncError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl AuthAdapter for ScriptedPlatform {
    async fn read_session(&self) -> Result<Option<Identity>, SyncError> {
        if let Some(error) = self.script.lock().await.session_failures.pop_front() {
            return Err(error);
        }
        self.inner.read_session().await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, SyncError> {
        self.inner.sign_in(credentials).await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Identity, SyncError> {
        self.inner.sign_up(request).await
    }

    async fn sign_out(&self) -> Result<(), SyncError> {
        self.inner.sign_out().await
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.subscribe()
    }
}

#[async_trait]
impl DataAdapter for ScriptedPlatform {
    async fn query(&self, descriptor: &QueryDescriptor) -> Result<Vec<Row>, SyncError> {
        self.reads.bump();
        self.hold_reads.pass().await;
        if let Some(error) = self.script.lock().await.read_failures.pop_front() {
            debug!(kind = %descriptor.kind, %error, "injected read failure");
            return Err(error);
        }
        self.inner.query(descriptor).await
    }

    async fn write(
        &self,
        kind: EntityKind,
        target: &WriteTarget,
        delta: &Delta,
    ) -> Result<WriteAck, SyncError> {
        self.writes.bump();
        self.hold_writes.pass().await;
        {
            let mut script = self.script.lock().await;
            if let Some(error) = script.write_failures.pop_front() {
                debug!(%kind, %error, "injected write failure");
                return Err(error);
            }
            if let Some(ack) = script.write_acks.pop_front() {
                debug!(%kind, "scripted write ack");
                return Ok(ack);
            }
        }
        self.inner.write(kind, target, delta).await
    }
}
