// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Readiness polling specs

use crate::prelude::*;
use nbr_engine::ReadinessPoller;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn poll_against_failing_endpoint_returns_after_grace_and_budget() {
    let (proxy, broker) = proxy();
    broker.respond("https://ingress.test/pod-1/api", [503]);
    let poller = ReadinessPoller::new(Arc::new(proxy));

    let start = Instant::now();
    let task = tokio::spawn(async move {
        let (max_wait, interval) = (Duration::from_millis(15_000), Duration::from_millis(5_000));
        poller.poll("https://ingress.test/pod-1", "token", max_wait, interval).await
    });

    tokio::time::sleep(Duration::from_millis(22_999)).await;
    assert!(!task.is_finished());

    assert!(task.await.unwrap());
    assert_eq!(start.elapsed(), Duration::from_millis(23_000));
    assert_eq!(broker.http_count("https://ingress.test/pod-1/api"), 4);
}
