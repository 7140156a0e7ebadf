// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{Harness, SlowWrites};
use nbr_adapters::{FakeRemoteApi, RemoteApiError, RemoteCall};
use nbr_storage::{keys, BindingStore, MemoryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const POD_API: &str = "https://ingress.test/pod-1/api";

fn doc(id: &str) -> DocumentId {
    DocumentId::new(id)
}

async fn persisted(store: &Arc<MemoryStore>, document_id: &DocumentId) -> Option<RuntimeId> {
    BindingStore::new(Arc::clone(store)).get(document_id).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn ensure_creates_polls_and_binds() {
    let h = Harness::new();
    let d = doc("doc1");

    let outcome = h.manager.ensure_runtime(&d).await.unwrap();

    let binding = outcome.binding().expect("ready binding");
    assert_eq!(*binding.runtime_id(), "pod-1");
    assert_eq!(binding.handle.base_url(), "https://ingress.test/pod-1");
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Ready);
    assert_eq!(h.remote.create_count(), 1);
    assert_eq!(h.broker.http_count(POD_API), 1);

    let cached = h.manager.cache().runtime(&RuntimeId::new("pod-1")).await.unwrap();
    assert_eq!(cached.status, RuntimeStatus::Running);
    assert_eq!(persisted(&h.store, &d).await, Some(RuntimeId::new("pod-1")));
}

#[tokio::test(start_paused = true)]
async fn ensure_uses_configured_environment_and_credits() {
    let h = Harness::new();
    let request = CreateRuntime::new("ai-env").given_name("Analysis").credits(5.0);

    h.manager.ensure_runtime_with(&doc("doc1"), request.clone()).await.unwrap();

    assert_eq!(h.remote.calls(), [RemoteCall::Create(request)]);
}

#[tokio::test(start_paused = true)]
async fn ensure_is_idempotent_once_ready() {
    let h = Harness::new();
    let d = doc("doc1");
    let first = h.manager.ensure_runtime(&d).await.unwrap();
    let second = h.manager.ensure_runtime(&d).await.unwrap();

    assert_eq!(first.binding().unwrap().runtime_id(), second.binding().unwrap().runtime_id());
    assert!(Arc::ptr_eq(&first.binding().unwrap().handle, &second.binding().unwrap().handle));
    assert_eq!(h.remote.create_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_ensure_creates_once() {
    let h = Harness::new();
    h.remote.delay_create(Duration::from_secs(2));
    let d = doc("doc1");

    let (a, b) = tokio::join!(h.manager.ensure_runtime(&d), h.manager.ensure_runtime(&d));

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(h.remote.create_count(), 1);
    assert_eq!(a.binding().unwrap().runtime_id(), b.binding().unwrap().runtime_id());
}

#[tokio::test(start_paused = true)]
async fn documents_start_independently() {
    let h = Harness::new();
    let (da, db) = (doc("a"), doc("b"));
    let (a, b) = tokio::join!(h.manager.ensure_runtime(&da), h.manager.ensure_runtime(&db));

    let mut pods = vec![
        a.unwrap().binding().unwrap().runtime_id().clone(),
        b.unwrap().binding().unwrap().runtime_id().clone(),
    ];
    pods.sort();
    assert_eq!(pods, [RuntimeId::new("pod-1"), RuntimeId::new("pod-2")]);
}

#[tokio::test(start_paused = true)]
async fn readiness_timeout_still_binds() {
    let h = Harness::new();
    h.broker.respond(POD_API, [503]);

    let start = Instant::now();
    let outcome = h.manager.ensure_runtime(&doc("doc1")).await.unwrap();

    assert!(outcome.binding().is_some());
    // 1s grace + 3s budget from the test config
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert_eq!(h.manager.phase(&doc("doc1")), LifecyclePhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn create_failure_is_user_visible_error() {
    let h = Harness::new();
    h.remote.fail_create(RemoteApiError::Auth { status: 401 });
    let d = doc("doc1");

    let err = h.manager.ensure_runtime(&d).await.unwrap_err();

    assert!(matches!(err, LifecycleError::Auth(_)));
    assert!(err.is_user_visible());
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Error);
    assert!(h.manager.binding(&d).is_none());
}

#[tokio::test(start_paused = true)]
async fn runtime_without_ingress_moves_to_error() {
    let h = Harness::new();
    h.remote.omit_ingress();
    let d = doc("doc1");

    let err = h.manager.ensure_runtime(&d).await.unwrap_err();

    assert!(matches!(err, LifecycleError::NoIngress(ref id) if *id == "pod-1"));
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Error);
    let cached = h.manager.cache().runtime(&RuntimeId::new("pod-1")).await.unwrap();
    assert_eq!(cached.status, RuntimeStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn terminate_blocks_restart_until_cleared() {
    let h = Harness::new();
    let d = doc("doc1");
    h.manager.ensure_runtime(&d).await.unwrap();

    h.manager.terminate(&d).await.unwrap();

    assert_eq!(h.remote.delete_count(), 1);
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Terminated);
    assert!(h.manager.binding(&d).is_none());
    assert!(h.manager.cache().runtime(&RuntimeId::new("pod-1")).await.is_none());
    assert_eq!(persisted(&h.store, &d).await, None);

    let calls_before = h.remote.calls().len();
    let outcome = h.manager.ensure_runtime(&d).await.unwrap();
    assert!(outcome.is_not_starting());
    assert_eq!(h.remote.calls().len(), calls_before);

    h.manager.clear_terminated(&d).await.unwrap();
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Uninitialized);
    let outcome = h.manager.ensure_runtime(&d).await.unwrap();
    assert_eq!(*outcome.binding().unwrap().runtime_id(), "pod-2");
}

#[tokio::test(start_paused = true)]
async fn terminated_flag_survives_restart() {
    let h = Harness::new();
    let d = doc("doc1");
    h.manager.ensure_runtime(&d).await.unwrap();
    h.manager.terminate(&d).await.unwrap();

    let restarted = Harness::with_store(Arc::clone(&h.store), h.remote.clone());
    assert!(restarted.manager.ensure_runtime(&d).await.unwrap().is_not_starting());
    assert_eq!(h.remote.create_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn terminate_disposes_kernel_sockets() {
    let h = Harness::new();
    let d = doc("doc1");
    let outcome = h.manager.ensure_runtime(&d).await.unwrap();
    outcome.binding().unwrap().handle.open_kernel_channel("k1").await.unwrap();
    assert_eq!(h.broker.open_ids().len(), 1);

    h.manager.terminate(&d).await.unwrap();

    assert!(h.broker.open_ids().is_empty());
    assert_eq!(h.manager.proxy().open_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_delete_keeps_terminating_record() {
    let h = Harness::new();
    let d = doc("doc1");
    h.manager.ensure_runtime(&d).await.unwrap();
    h.remote.fail_delete(RemoteApiError::Api("runtime busy".into()));

    let err = h.manager.terminate(&d).await.unwrap_err();

    assert!(matches!(err, LifecycleError::Remote(_)));
    assert!(h.manager.binding(&d).is_none());
    assert_eq!(persisted(&h.store, &d).await, None);
    let cached = h.manager.cache().runtime(&RuntimeId::new("pod-1")).await.unwrap();
    assert_eq!(cached.status, RuntimeStatus::Terminating);
    assert!(h.manager.ensure_runtime(&d).await.unwrap().is_not_starting());
}

#[tokio::test(start_paused = true)]
async fn terminate_without_runtime_only_sets_flag() {
    let h = Harness::new();
    let d = doc("never-started");

    h.manager.terminate(&d).await.unwrap();

    assert_eq!(h.remote.delete_count(), 0);
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Terminated);
    assert!(h.manager.ensure_runtime(&d).await.unwrap().is_not_starting());
}

#[tokio::test(start_paused = true)]
async fn terminate_during_create_deletes_the_new_runtime() {
    let h = Harness::new();
    h.remote.delay_create(Duration::from_secs(5));
    let d = doc("doc1");

    let manager = Arc::clone(&h.manager);
    let pending = {
        let d = d.clone();
        tokio::spawn(async move { manager.ensure_runtime(&d).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.manager.terminate(&d).await.unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(LifecycleError::Cancelled(_))));
    assert_eq!(h.remote.delete_count(), 1);
    assert!(h.remote.runtimes().is_empty());
    assert!(h.manager.binding(&d).is_none());
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Terminated);
}

#[tokio::test(start_paused = true)]
async fn failed_delete_of_abandoned_runtime_stays_terminating() {
    let h = Harness::new();
    h.remote.delay_create(Duration::from_secs(5));
    h.remote.fail_delete(RemoteApiError::Api("runtime busy".into()));
    let d = doc("doc1");

    let manager = Arc::clone(&h.manager);
    let pending = {
        let d = d.clone();
        tokio::spawn(async move { manager.ensure_runtime(&d).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.manager.terminate(&d).await.unwrap();

    assert!(matches!(pending.await.unwrap(), Err(LifecycleError::Cancelled(_))));
    assert_eq!(h.remote.delete_count(), 1);
    let cached = h.manager.cache().runtime(&RuntimeId::new("pod-1")).await.unwrap();
    assert_eq!(cached.status, RuntimeStatus::Terminating);
    assert_eq!(persisted(&h.store, &d).await, None);
}

/// Start a document over a store with slow writes to `prefix`, and
/// terminate it `after` into the start.
async fn terminate_mid_start(prefix: &'static str, after: Duration) -> Harness<SlowWrites> {
    let store = Arc::new(SlowWrites::new(prefix, Duration::from_millis(100)));
    let h = Harness::with_store(store, FakeRemoteApi::new());
    let d = doc("doc1");

    let manager = Arc::clone(&h.manager);
    let pending = {
        let d = d.clone();
        tokio::spawn(async move { manager.ensure_runtime(&d).await })
    };
    tokio::time::sleep(after).await;
    h.manager.terminate(&d).await.unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(LifecycleError::Cancelled(_))));
    h
}

async fn assert_runtime_deleted(h: &Harness<SlowWrites>) {
    let d = doc("doc1");
    assert_eq!(h.remote.delete_count(), 1);
    assert!(h.remote.runtimes().is_empty());
    assert!(h.manager.binding(&d).is_none());
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Terminated);
    assert_eq!(BindingStore::new(Arc::clone(&h.store)).get(&d).await.unwrap(), None);
    assert!(h.manager.cache().runtime(&RuntimeId::new("pod-1")).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn terminate_while_binding_is_persisted_deletes_runtime() {
    // Ready at 1s, then the binding write takes until 1.1s
    let h = terminate_mid_start(keys::BINDINGS, Duration::from_millis(1_050)).await;
    assert_runtime_deleted(&h).await;
}

#[tokio::test(start_paused = true)]
async fn terminate_while_running_status_is_cached_deletes_runtime() {
    // First cache write lands at 0.1s, ready at 1.1s, Running write until 1.2s
    let h = terminate_mid_start(keys::RUNTIME_PREFIX, Duration::from_millis(1_150)).await;
    assert_runtime_deleted(&h).await;
}

#[tokio::test(start_paused = true)]
async fn close_during_poll_abandons_start_and_reopen_reconnects() {
    let h = Harness::new();
    h.broker.respond(POD_API, [503]);
    let d = doc("doc1");

    let manager = Arc::clone(&h.manager);
    let pending = {
        let d = d.clone();
        tokio::spawn(async move { manager.ensure_runtime(&d).await })
    };
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(h.manager.phase(&d), LifecyclePhase::AwaitingReady);
    h.manager.close_document(&d).await;

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(LifecycleError::Cancelled(_))));
    assert_eq!(h.manager.phase(&d), LifecyclePhase::Uninitialized);
    assert!(h.manager.binding(&d).is_none());
    assert_eq!(persisted(&h.store, &d).await, Some(RuntimeId::new("pod-1")));

    h.broker.respond(POD_API, [200]);
    let outcome = h.manager.ensure_runtime(&d).await.unwrap();
    assert_eq!(*outcome.binding().unwrap().runtime_id(), "pod-1");
    assert_eq!(h.remote.create_count(), 1);
    let cached = h.manager.cache().runtime(&RuntimeId::new("pod-1")).await.unwrap();
    assert_eq!(cached.status, RuntimeStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn reopen_after_runtime_died_creates_fresh() {
    let h = Harness::new();
    let d = doc("doc1");
    h.manager.ensure_runtime(&d).await.unwrap();
    h.manager.close_document(&d).await;

    h.broker.respond(POD_API, [502]);
    let outcome = h.manager.ensure_runtime(&d).await.unwrap();

    assert_eq!(*outcome.binding().unwrap().runtime_id(), "pod-2");
    assert_eq!(persisted(&h.store, &d).await, Some(RuntimeId::new("pod-2")));
}

#[tokio::test(start_paused = true)]
async fn close_document_keeps_remote_runtime() {
    let h = Harness::new();
    let d = doc("doc1");
    let outcome = h.manager.ensure_runtime(&d).await.unwrap();
    outcome.binding().unwrap().handle.open_kernel_channel("k1").await.unwrap();

    h.manager.close_document(&d).await;

    assert!(h.manager.binding(&d).is_none());
    assert_eq!(h.remote.delete_count(), 0);
    assert!(h.broker.open_ids().is_empty());
    assert!(h.manager.cache().runtime(&RuntimeId::new("pod-1")).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn environments_are_cached_for_an_hour() {
    let h = Harness::new();
    h.remote.set_environments(nbr_core::test_support::environments());

    let first = h.manager.environments().await.unwrap();
    let second = h.manager.environments().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);

    h.clock.advance(Duration::from_secs(60 * 60));
    h.manager.environments().await.unwrap();

    let fetches = h.remote.calls().iter().filter(|c| **c == RemoteCall::Environments).count();
    assert_eq!(fetches, 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_operation_within_window_is_skipped() {
    let h = Harness::new();
    let runs = AtomicUsize::new(0);
    let args = serde_json::json!({"document": "doc1", "cell": 2});
    let counter = &runs;
    let run = move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, LifecycleError>("done")
    };

    let first = h.manager.run_deduplicated("execute", &args, run()).await.unwrap();
    let second = h.manager.run_deduplicated("execute", &args, run()).await.unwrap();
    assert_eq!(first, Dedup::Executed("done"));
    assert_eq!(second, Dedup::Duplicate);

    h.clock.advance(h.manager.config().dedup_window);
    let third = h.manager.run_deduplicated("execute", &args, run()).await.unwrap();
    assert_eq!(third, Dedup::Executed("done"));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_operation_can_be_retried() {
    let h = Harness::new();
    let args = serde_json::json!({"document": "doc1"});

    let failed = h
        .manager
        .run_deduplicated("terminate", &args, async {
            Err::<(), _>(LifecycleError::Cancelled(doc("doc1")))
        })
        .await;
    assert!(failed.is_err());

    let retried = h
        .manager
        .run_deduplicated("terminate", &args, async { Ok::<_, LifecycleError>(()) })
        .await;
    assert_eq!(retried.unwrap(), Dedup::Executed(()));
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_everything() {
    let h = Harness::new();
    for id in ["a", "b"] {
        let outcome = h.manager.ensure_runtime(&doc(id)).await.unwrap();
        outcome.binding().unwrap().handle.open_kernel_channel("k").await.unwrap();
    }
    let args = serde_json::json!({});
    let noop = || async { Ok::<_, LifecycleError>(()) };
    h.manager.run_deduplicated("op", &args, noop()).await.unwrap();

    h.manager.shutdown().await;

    for id in ["a", "b"] {
        assert!(h.manager.binding(&doc(id)).is_none());
        assert_eq!(h.manager.phase(&doc(id)), LifecyclePhase::Uninitialized);
    }
    assert!(h.broker.open_ids().is_empty());
    assert_eq!(h.manager.proxy().open_connections(), 0);
    assert_eq!(h.remote.delete_count(), 0);
    let again = h.manager.run_deduplicated("op", &args, noop()).await;
    assert_eq!(again.unwrap(), Dedup::Executed(()));
}
