// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime lifecycle specs

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn concurrent_ensure_creates_one_runtime() {
    let world = World::new();
    world.remote.delay_create(Duration::from_millis(500));
    let doc = DocumentId::new("doc1");

    let manager = &world.manager;
    let (a, b) = tokio::join!(manager.ensure_runtime(&doc), manager.ensure_runtime(&doc));

    assert_eq!(world.remote.create_count(), 1);
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.binding().unwrap().runtime_id(), b.binding().unwrap().runtime_id());
    assert_eq!(world.manager.phase(&doc), LifecyclePhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn terminated_document_does_not_restart_until_cleared() {
    let world = World::new();
    let doc = DocumentId::new("doc1");
    world.manager.ensure_runtime(&doc).await.unwrap();
    world.manager.terminate(&doc).await.unwrap();
    let calls = world.remote.calls().len();

    for _ in 0..3 {
        assert!(world.manager.ensure_runtime(&doc).await.unwrap().is_not_starting());
    }
    assert_eq!(world.remote.calls().len(), calls);

    world.manager.clear_terminated(&doc).await.unwrap();
    let outcome = world.manager.ensure_runtime(&doc).await.unwrap();
    assert_eq!(*outcome.binding().unwrap().runtime_id(), RuntimeId::new("pod-2"));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_runtime_binds_after_full_readiness_budget() {
    let world = World::new();
    world.broker.respond("https://ingress.test/pod-1/api", [503]);

    let start = tokio::time::Instant::now();
    let outcome = world.manager.ensure_runtime(&DocumentId::new("doc1")).await.unwrap();

    assert!(outcome.binding().is_some());
    // default 8s grace plus 60s budget
    assert_eq!(start.elapsed(), Duration::from_secs(68));
}
