// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the sync core over a scripted platform.

use std::sync::Arc;

use campsync_config::SyncConfig;
use campsync_core::{
    fields, Credentials, Delta, EntityId, EntityKind, QueryDescriptor, Row, SignUpRequest, SortKey,
    SyncError, WriteAck, WriteTarget,
};
use campsync_memory::MemoryPlatform;
use campsync_sync::{MutationState, SessionState, SyncClient};
use campsync_test_utils::harness::{TEST_EMAIL, TEST_PASSWORD};
use campsync_test_utils::{ScriptedPlatform, TestHarness};

fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn recent_projects() -> QueryDescriptor {
    QueryDescriptor::new(EntityKind::Project)
        .sort(SortKey::desc("created_at"))
        .limit(3)
}

fn seed_project(harness: &TestHarness, id: &str, title: &str) {
    harness
        .platform
        .inner()
        .insert_row(EntityKind::Project, row(serde_json::json!({"id": id, "title": title})))
        .unwrap();
}

#[tokio::test]
async fn repeated_query_reads_remote_once() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");

    let first = h.client.query(&recent_projects()).await.unwrap();
    let second = h.client.query(&recent_projects()).await.unwrap();
    assert_eq!(first.ids, second.ids);
    assert_eq!(h.platform.read_count(), 1);
}

#[tokio::test]
async fn concurrent_queries_share_one_read() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    h.platform.hold_reads();

    let query_a = recent_projects();
    let query_b = recent_projects();
    let (a, b, ()) = tokio::join!(
        h.client.query(&query_a),
        h.client.query(&query_b),
        async {
            h.platform.wait_for_reads(1).await;
            h.platform.release_reads();
        }
    );
    assert_eq!(a.unwrap().ids, vec![EntityId::new("P1")]);
    assert_eq!(b.unwrap().ids, vec![EntityId::new("P1")]);
    assert_eq!(h.platform.read_count(), 1);
}

#[tokio::test]
async fn insert_replaces_temp_id_with_server_id() {
    let h = TestHarness::new().await.unwrap();

    let empty = h.client.query(&recent_projects()).await.unwrap();
    assert!(empty.ids.is_empty());

    h.platform
        .override_next_write(WriteAck::Row(row(serde_json::json!({"id": "P1", "title": "X"}))))
        .await;
    let handle = h
        .client
        .mutate(
            EntityKind::Project,
            WriteTarget::New,
            Delta::Patch(fields! { "title" => "X" }),
        )
        .await
        .unwrap();
    let temp = handle.target().clone();
    assert!(h.client.store().get(EntityKind::Project, &temp).is_some());

    let state = handle.subscribe();
    handle.wait().await.unwrap();
    assert_eq!(
        *state.borrow(),
        MutationState::Committed {
            id: EntityId::new("P1")
        }
    );

    let store = h.client.store();
    assert_eq!(store.len(EntityKind::Project), 1);
    assert!(store.get(EntityKind::Project, &temp).is_none());
    let p1 = store.get(EntityKind::Project, &EntityId::new("P1")).unwrap();
    assert_eq!(p1.text("title"), Some("X"));

    // The commit invalidated the cached listing.
    assert!(h.client.cache().peek(&recent_projects()).unwrap().stale);
    h.client.query(&recent_projects()).await.unwrap();
    assert_eq!(h.platform.read_count(), 2);
}

#[tokio::test]
async fn commit_adopts_server_computed_values() {
    let h = TestHarness::new().await.unwrap();
    h.platform
        .override_next_write(WriteAck::Row(row(serde_json::json!({
            "id": "P1",
            "title": "X (approved)",
            "tags": null,
            "created_at": "2026-10-16T09:00:00.000000Z"
        }))))
        .await;

    let committed = h
        .client
        .insert(EntityKind::Project, fields! { "title" => "X", "looking_for" => "designers" })
        .await
        .unwrap();

    let stored = h
        .client
        .store()
        .get(EntityKind::Project, &EntityId::new("P1"))
        .unwrap();
    assert_eq!(stored, committed);
    assert_eq!(stored.text("title"), Some("X (approved)"));
    // The optimistic-only field is gone: the authoritative row replaces it.
    assert_eq!(stored.text("looking_for"), None);
}

#[tokio::test]
async fn failed_write_rolls_back_exactly() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    h.client.query(&recent_projects()).await.unwrap();
    let before = h.client.store().get(EntityKind::Project, &EntityId::new("P1"));

    let rejection = SyncError::MutationRejected {
        kind: EntityKind::Project,
        message: "new row violates row-level security policy".into(),
    };
    h.platform.fail_next_write(rejection.clone()).await;
    let handle = h
        .client
        .mutate(
            EntityKind::Project,
            WriteTarget::Existing(EntityId::new("P1")),
            Delta::Patch(fields! { "title" => "Y" }),
        )
        .await
        .unwrap();
    assert_eq!(
        h.client
            .store()
            .get(EntityKind::Project, &EntityId::new("P1"))
            .unwrap()
            .text("title"),
        Some("Y")
    );

    let err = handle.wait().await.unwrap_err();
    assert_eq!(err, rejection);
    assert_eq!(err.to_string(), "new row violates row-level security policy");
    assert_eq!(
        h.client.store().get(EntityKind::Project, &EntityId::new("P1")),
        before
    );
}

#[tokio::test]
async fn unclassified_write_failure_is_a_rejection() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    h.client.query(&recent_projects()).await.unwrap();
    let before = h.client.store().get(EntityKind::Project, &EntityId::new("P1"));

    h.platform
        .fail_next_write(SyncError::Internal("upstream timeout".into()))
        .await;
    let err = h
        .client
        .update(EntityKind::Project, &EntityId::new("P1"), fields! { "title" => "Y" })
        .await
        .unwrap_err();
    match &err {
        SyncError::MutationRejected { kind, message } => {
            assert_eq!(*kind, EntityKind::Project);
            assert!(message.contains("upstream timeout"));
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert!(err.is_rejection());
    assert_eq!(
        h.client.store().get(EntityKind::Project, &EntityId::new("P1")),
        before
    );
}

#[tokio::test]
async fn malformed_ack_rolls_back_with_schema_error() {
    let h = TestHarness::new().await.unwrap();
    h.platform
        .override_next_write(WriteAck::Row(row(serde_json::json!({"title": "X"}))))
        .await;
    let handle = h
        .client
        .mutate(
            EntityKind::Project,
            WriteTarget::New,
            Delta::Patch(fields! { "title" => "X" }),
        )
        .await
        .unwrap();
    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, SyncError::Schema { kind: EntityKind::Project, .. }));
    assert!(h.client.store().is_empty());
}

#[tokio::test]
async fn same_key_mutations_apply_in_order() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    h.client.query(&recent_projects()).await.unwrap();
    h.platform.hold_writes();

    let p1 = EntityId::new("P1");
    let first = h
        .client
        .mutate(
            EntityKind::Project,
            WriteTarget::Existing(p1.clone()),
            Delta::Patch(fields! { "title" => "A" }),
        )
        .await
        .unwrap();
    let second = h
        .client
        .mutate(
            EntityKind::Project,
            WriteTarget::Existing(p1.clone()),
            Delta::Patch(fields! { "title" => "B" }),
        )
        .await
        .unwrap();

    assert_eq!(first.state(), MutationState::Pending);
    assert_eq!(second.state(), MutationState::Queued);
    // The queued delta is not applied while the first is in flight.
    assert_eq!(
        h.client.store().get(EntityKind::Project, &p1).unwrap().text("title"),
        Some("A")
    );
    assert_eq!(h.client.mutations().pending_count(), 2);

    h.platform.wait_for_writes(1).await;
    h.platform.release_writes();
    first.wait().await.unwrap();
    second.wait().await.unwrap();

    assert_eq!(h.platform.write_count(), 2);
    assert_eq!(
        h.client.store().get(EntityKind::Project, &p1).unwrap().text("title"),
        Some("B")
    );
    let rows = h.platform.inner().rows(EntityKind::Project);
    assert_eq!(rows[0]["title"], "B");
}

#[tokio::test]
async fn sign_out_discards_pending_mutation() {
    let h = TestHarness::new().await.unwrap();
    h.platform.hold_writes();

    let handle = h
        .client
        .mutate(
            EntityKind::Project,
            WriteTarget::New,
            Delta::Patch(fields! { "title" => "X" }),
        )
        .await
        .unwrap();
    h.platform.wait_for_writes(1).await;

    h.client.session().sign_out().await.unwrap();
    assert!(h.client.store().is_empty());
    h.platform.release_writes();

    let state = handle.subscribe();
    assert_eq!(handle.wait().await, Err(SyncError::SessionChanged));
    assert_eq!(*state.borrow(), MutationState::Discarded);
    assert!(h.client.store().is_empty());
    assert_eq!(h.client.mutations().pending_count(), 0);
}

#[tokio::test]
async fn read_racing_sign_out_is_discarded() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    h.platform.hold_reads();

    let query = recent_projects();
    let (result, ()) = tokio::join!(h.client.query(&query), async {
        h.platform.wait_for_reads(1).await;
        h.client.session().sign_out().await.unwrap();
        h.platform.release_reads();
    });

    let result = result.unwrap();
    assert_eq!(result.error, Some(SyncError::SessionChanged));
    assert!(result.ids.is_empty());
    assert!(h.client.store().is_empty());
    assert!(h.client.cache().is_empty());
}

#[tokio::test]
async fn read_racing_invalidation_is_not_cached() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    h.platform.hold_reads();

    let query = recent_projects();
    let (result, ()) = tokio::join!(h.client.query(&query), async {
        h.platform.wait_for_reads(1).await;
        h.client.cache().invalidate(EntityKind::Project);
        h.platform.release_reads();
    });

    let result = result.unwrap();
    assert!(result.stale);
    assert!(h.client.cache().peek(&recent_projects()).is_none());

    let fresh = h.client.query(&recent_projects()).await.unwrap();
    assert!(!fresh.stale);
    assert_eq!(h.platform.read_count(), 2);
}

#[tokio::test]
async fn failed_refresh_keeps_prior_result() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    let first = h.client.query(&recent_projects()).await.unwrap();

    h.client.cache().invalidate(EntityKind::Project);
    h.platform
        .fail_next_read(SyncError::QueryFailed {
            kind: EntityKind::Project,
            message: "timeout".into(),
        })
        .await;
    let refreshed = h.client.query(&recent_projects()).await.unwrap();
    assert_eq!(refreshed.ids, first.ids);
    assert!(refreshed.stale);
    assert!(matches!(refreshed.error, Some(SyncError::QueryFailed { .. })));

    // Still stale, so the next query reads again and recovers.
    let entities = h.client.fetch(&recent_projects()).await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(h.platform.read_count(), 3);
}

#[tokio::test]
async fn unclassified_read_failure_is_a_query_failure() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    h.platform
        .fail_next_read(SyncError::Internal("upstream timeout".into()))
        .await;

    let result = h.client.query(&recent_projects()).await.unwrap();
    match result.error {
        Some(SyncError::QueryFailed { kind, message }) => {
            assert_eq!(kind, EntityKind::Project);
            assert!(message.contains("upstream timeout"));
        }
        other => panic!("expected a query failure, got {other:?}"),
    }
    assert!(result.ids.is_empty());
    assert!(h.client.store().is_empty());
}

#[tokio::test]
async fn failed_first_read_is_an_error() {
    let h = TestHarness::new().await.unwrap();
    h.platform
        .fail_next_read(SyncError::QueryFailed {
            kind: EntityKind::Event,
            message: "timeout".into(),
        })
        .await;
    let err = h
        .client
        .fetch(&QueryDescriptor::new(EntityKind::Event))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::QueryFailed { kind: EntityKind::Event, .. }));
}

#[tokio::test]
async fn queries_wait_for_session_check() {
    let platform = Arc::new(ScriptedPlatform::empty());
    let client = SyncClient::new(SyncConfig::default(), platform.clone());
    assert_eq!(client.session().current(), SessionState::Unknown);

    let query = recent_projects();
    let (result, ()) = tokio::join!(client.query(&query), async {
        tokio::task::yield_now().await;
        assert_eq!(platform.read_count(), 0);
        client.session().start().await.unwrap();
    });
    assert_eq!(result, Err(SyncError::Unauthenticated));
    assert_eq!(platform.read_count(), 0);
}

#[tokio::test]
async fn unavailable_session_check_leaves_gate_signed_out() {
    let platform = Arc::new(ScriptedPlatform::empty());
    platform
        .fail_next_session_read(SyncError::Internal("connection reset".into()))
        .await;
    let client = SyncClient::new(SyncConfig::default(), platform);
    let err = client.session().start().await.unwrap_err();
    assert!(matches!(err, SyncError::SessionUnavailable { .. }));
    assert_eq!(client.session().current(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn remote_sign_out_resets_local_state() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    h.client.query(&recent_projects()).await.unwrap();
    assert!(!h.client.store().is_empty());

    let mut state = h.client.session().subscribe();
    h.platform.inner().simulate_remote_sign_out();
    state
        .wait_for(|s| *s == SessionState::Unauthenticated)
        .await
        .unwrap();

    assert!(h.client.store().is_empty());
    assert!(h.client.cache().is_empty());
    assert_eq!(
        h.client.query(&recent_projects()).await.unwrap_err(),
        SyncError::Unauthenticated
    );
}

#[tokio::test]
async fn switching_user_resets_local_state() {
    let h = TestHarness::new().await.unwrap();
    let first = h.identity().await.unwrap();
    seed_project(&h, "P1", "X");
    h.client.query(&recent_projects()).await.unwrap();

    let second = h
        .client
        .session()
        .sign_up(&SignUpRequest {
            email: "other@campus.edu".into(),
            password: "secret".into(),
            metadata: Default::default(),
        })
        .await
        .unwrap();
    assert_ne!(first.user_id, second.user_id);
    assert!(h.client.store().is_empty());
    assert_eq!(h.identity().await.unwrap(), second);
}

#[tokio::test]
async fn sign_up_rate_limit_surfaces_as_rate_limited() {
    let mut config = SyncConfig::default();
    config.memory.seed_fixtures = false;
    config.memory.signup_limit_per_window = 1;
    let platform = Arc::new(ScriptedPlatform::new(MemoryPlatform::new(config.memory.clone())));
    let client = SyncClient::connect(config, platform).await.unwrap();

    let request = |email: &str| SignUpRequest {
        email: email.into(),
        password: "secret".into(),
        metadata: Default::default(),
    };
    let first = client.session().sign_up(&request("a@campus.edu")).await.unwrap();
    let err = client
        .session()
        .sign_up(&request("b@campus.edu"))
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());
    assert!(err.is_rejection());
    assert_eq!(client.session().current(), SessionState::Authenticated(first));
}

#[tokio::test]
async fn write_after_signing_back_in_is_kept() {
    let h = TestHarness::new().await.unwrap();
    let session = h.client.session();
    session.sign_out().await.unwrap();
    let identity = session
        .sign_in(&Credentials {
            email: TEST_EMAIL.into(),
            password: TEST_PASSWORD.into(),
        })
        .await
        .unwrap();

    let created = h
        .client
        .insert(EntityKind::Project, fields! { "title" => "X" })
        .await
        .unwrap();

    // Let the session listener catch up on the sign-out and sign-in.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(session.current(), SessionState::Authenticated(identity));
    assert_eq!(h.client.store().len(EntityKind::Project), 1);
    assert!(h
        .client
        .store()
        .get(EntityKind::Project, &created.id)
        .is_some());
    assert_eq!(h.platform.inner().rows(EntityKind::Project).len(), 1);
}

#[tokio::test]
async fn query_from_ended_session_reads_nothing() {
    let h = TestHarness::new().await.unwrap();
    seed_project(&h, "P1", "X");
    let (_, epoch) = h.client.session().session().await.unwrap();
    h.client.session().sign_out().await.unwrap();

    let result = h.client.cache().resolve_at(&recent_projects(), epoch).await;
    assert_eq!(result.error, Some(SyncError::SessionChanged));
    assert_eq!(h.platform.read_count(), 0);
}
