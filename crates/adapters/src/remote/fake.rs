// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`RemoteApi`] for tests.

use super::{CreateRuntime, RemoteApi, RemoteApiError};
use async_trait::async_trait;
use nbr_core::{Environment, RuntimeId, RuntimeRecord, RuntimeStatus};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Recorded call to the fake API.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Create(CreateRuntime),
    Delete(RuntimeId),
    List,
    Environments,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<RemoteCall>,
    runtimes: BTreeMap<RuntimeId, RuntimeRecord>,
    environments: Vec<Environment>,
    next_pod: u32,
    create_error: Option<RemoteApiError>,
    delete_error: Option<RemoteApiError>,
    list_error: Option<RemoteApiError>,
    create_delay: Option<Duration>,
    omit_ingress: bool,
}

/// Fake remote platform. Created runtimes get sequential pod names
/// (`pod-1`, `pod-2`, …) and an ingress under `https://ingress.test/`.
#[derive(Clone, Default)]
pub struct FakeRemoteApi {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeRemoteApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.inner.lock().calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.inner.lock().calls.iter().filter(|c| matches!(c, RemoteCall::Create(_))).count()
    }

    pub fn delete_count(&self) -> usize {
        self.inner.lock().calls.iter().filter(|c| matches!(c, RemoteCall::Delete(_))).count()
    }

    /// Runtimes the fake server currently knows about.
    pub fn runtimes(&self) -> Vec<RuntimeRecord> {
        self.inner.lock().runtimes.values().cloned().collect()
    }

    pub fn insert_runtime(&self, record: RuntimeRecord) {
        self.inner.lock().runtimes.insert(record.pod_name.clone(), record);
    }

    /// Forget a runtime server-side, as if it expired.
    pub fn drop_runtime(&self, pod_name: &str) {
        self.inner.lock().runtimes.remove(pod_name);
    }

    pub fn set_environments(&self, environments: Vec<Environment>) {
        self.inner.lock().environments = environments;
    }

    pub fn fail_create(&self, error: RemoteApiError) {
        self.inner.lock().create_error = Some(error);
    }

    pub fn fail_delete(&self, error: RemoteApiError) {
        self.inner.lock().delete_error = Some(error);
    }

    pub fn fail_list(&self, error: RemoteApiError) {
        self.inner.lock().list_error = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.inner.lock();
        state.create_error = None;
        state.delete_error = None;
        state.list_error = None;
    }

    /// Hold every create for `delay` before answering.
    pub fn delay_create(&self, delay: Duration) {
        self.inner.lock().create_delay = Some(delay);
    }

    /// Answer creates without an ingress URL.
    pub fn omit_ingress(&self) {
        self.inner.lock().omit_ingress = true;
    }
}

#[async_trait]
impl RemoteApi for FakeRemoteApi {
    async fn create_runtime(
        &self,
        request: CreateRuntime,
    ) -> Result<RuntimeRecord, RemoteApiError> {
        let delay = {
            let mut state = self.inner.lock();
            state.calls.push(RemoteCall::Create(request.clone()));
            state.create_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.inner.lock();
        if let Some(err) = state.create_error.clone() {
            return Err(err);
        }
        state.next_pod += 1;
        let pod = format!("pod-{}", state.next_pod);
        let mut record = RuntimeRecord::new(pod.as_str(), request.environment, 1_000_000);
        record.given_name = request.given_name;
        record.max_credits = request.credits;
        if !state.omit_ingress {
            record.ingress_url = Some(format!("https://ingress.test/{pod}"));
            record.token = Some(format!("token-{pod}"));
        }
        let mut server_copy = record.clone();
        server_copy.status = RuntimeStatus::Running;
        state.runtimes.insert(record.pod_name.clone(), server_copy);
        Ok(record)
    }

    async fn delete_runtime(&self, pod_name: &RuntimeId) -> Result<(), RemoteApiError> {
        let mut state = self.inner.lock();
        state.calls.push(RemoteCall::Delete(pod_name.clone()));
        if let Some(err) = state.delete_error.clone() {
            return Err(err);
        }
        state.runtimes.remove(pod_name);
        Ok(())
    }

    async fn list_user_runtimes(&self) -> Result<Vec<RuntimeRecord>, RemoteApiError> {
        let mut state = self.inner.lock();
        state.calls.push(RemoteCall::List);
        if let Some(err) = state.list_error.clone() {
            return Err(err);
        }
        Ok(state.runtimes.values().cloned().collect())
    }

    async fn environments(&self) -> Result<Vec<Environment>, RemoteApiError> {
        let mut state = self.inner.lock();
        state.calls.push(RemoteCall::Environments);
        Ok(state.environments.clone())
    }
}
