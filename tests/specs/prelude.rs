// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wiring for specs.

pub use nbr_adapters::{FakeBroker, FakeRemoteApi, InProcessTransport};
pub use nbr_core::{DocumentId, FakeClock, LifecyclePhase, RuntimeId, RuntimeRecord};
pub use nbr_engine::{ConnectivityProxy, EngineConfig, LifecycleDeps, RuntimeLifecycleManager};
pub use nbr_storage::{CacheLayer, MemoryStore};
pub use std::sync::Arc;
pub use std::time::Duration;

pub type Manager = RuntimeLifecycleManager<FakeRemoteApi, MemoryStore, FakeClock>;

pub fn proxy() -> (ConnectivityProxy, FakeBroker) {
    let (broker, events) = FakeBroker::new();
    let transport = InProcessTransport::new(Arc::new(broker.clone()), events);
    (ConnectivityProxy::new(Arc::new(transport)), broker)
}

/// Manager with production timings over fresh fakes.
pub struct World {
    pub manager: Arc<Manager>,
    pub remote: FakeRemoteApi,
    pub broker: FakeBroker,
}

impl World {
    pub fn new() -> Self {
        let remote = FakeRemoteApi::new();
        let (proxy, broker) = proxy();
        let deps = LifecycleDeps {
            remote: Arc::new(remote.clone()),
            store: Arc::new(MemoryStore::new()),
            proxy,
        };
        let config = EngineConfig::default();
        let manager = Arc::new(RuntimeLifecycleManager::new(deps, FakeClock::new(), config));
        Self { manager, remote, broker }
    }
}
