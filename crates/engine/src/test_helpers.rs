// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::env::EngineConfig;
use crate::lifecycle::{LifecycleDeps, RuntimeLifecycleManager};
use crate::proxy::ConnectivityProxy;
use async_trait::async_trait;
use nbr_adapters::{FakeBroker, FakeRemoteApi, InProcessTransport};
use nbr_core::FakeClock;
use nbr_storage::{MemoryStore, StateStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Proxy wired to a [`FakeBroker`] in-process.
pub(crate) fn fake_proxy() -> (ConnectivityProxy, FakeBroker) {
    let (broker, events) = FakeBroker::new();
    let transport = InProcessTransport::new(Arc::new(broker.clone()), events);
    (ConnectivityProxy::new(Arc::new(transport)), broker)
}

/// Lifecycle timings short enough to reason about in paused-time tests.
pub(crate) fn test_config() -> EngineConfig {
    EngineConfig::default()
        .poll_grace(Duration::from_secs(1))
        .poll_interval(Duration::from_secs(1))
        .poll_timeout(Duration::from_secs(3))
}

pub(crate) type TestManager<S = MemoryStore> = RuntimeLifecycleManager<FakeRemoteApi, S, FakeClock>;

pub(crate) struct Harness<S: StateStore = MemoryStore> {
    pub manager: Arc<TestManager<S>>,
    pub remote: FakeRemoteApi,
    pub broker: FakeBroker,
    pub store: Arc<S>,
    pub clock: FakeClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), FakeRemoteApi::new())
    }
}

impl<S: StateStore> Harness<S> {
    /// Build a manager over an existing store and remote, as after a restart.
    pub fn with_store(store: Arc<S>, remote: FakeRemoteApi) -> Self {
        let (proxy, broker) = fake_proxy();
        let clock = FakeClock::new();
        let deps = LifecycleDeps {
            remote: Arc::new(remote.clone()),
            store: Arc::clone(&store),
            proxy,
        };
        let manager = Arc::new(RuntimeLifecycleManager::new(deps, clock.clone(), test_config()));
        Self { manager, remote, broker, store, clock }
    }
}

/// Store whose writes to keys under `prefix` take `delay` to land.
pub(crate) struct SlowWrites {
    inner: MemoryStore,
    prefix: &'static str,
    delay: Duration,
}

impl SlowWrites {
    pub fn new(prefix: &'static str, delay: Duration) -> Self {
        Self { inner: MemoryStore::new(), prefix, delay }
    }
}

#[async_trait]
impl StateStore for SlowWrites {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        if key.starts_with(self.prefix) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.has(key).await
    }
}
