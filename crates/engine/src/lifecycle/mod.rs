// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-document runtime lifecycle.
//!
//! `Uninitialized → Creating → AwaitingReady → Ready → Terminating →
//! Terminated`, with `Error` reachable while creating or awaiting readiness.
//!
//! Each document owns a liveness token. Closing the document cancels it, and
//! every step of an in-flight start checks it after each suspension point so
//! a stale continuation never installs a binding or reports `Ready`.

mod reconcile;

pub use reconcile::{ReconnectReport, SyncReport};

use crate::dedup::{Dedup, ExecutionDedup};
use crate::env::EngineConfig;
use crate::error::LifecycleError;
use crate::poller::{PollOutcome, ReadinessPoller};
use crate::proxy::{ConnectionHandle, ConnectivityProxy};
use nbr_adapters::{CreateRuntime, RemoteApi};
use nbr_core::{
    Clock, DocumentId, Environment, LifecyclePhase, RuntimeId, RuntimeRecord, RuntimeStatus,
};
use nbr_storage::{BindingStore, CacheLayer, StateStore, TerminatedFlags};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// External collaborators of the manager.
pub struct LifecycleDeps<R: RemoteApi, S: StateStore> {
    pub remote: Arc<R>,
    pub store: Arc<S>,
    pub proxy: ConnectivityProxy,
}

/// A document's live connection to its runtime.
#[derive(Clone)]
pub struct ActiveBinding {
    pub document_id: DocumentId,
    pub runtime: RuntimeRecord,
    pub handle: Arc<ConnectionHandle>,
}

impl ActiveBinding {
    pub fn runtime_id(&self) -> &RuntimeId {
        &self.runtime.pod_name
    }
}

impl std::fmt::Debug for ActiveBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveBinding")
            .field("document_id", &self.document_id)
            .field("runtime", &self.runtime.pod_name)
            .field("url", &self.handle.base_url())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum EnsureOutcome {
    Ready(ActiveBinding),
    /// The user terminated this document's runtime; nothing was started
    NotStarting,
}

impl EnsureOutcome {
    pub fn binding(&self) -> Option<&ActiveBinding> {
        match self {
            Self::Ready(binding) => Some(binding),
            Self::NotStarting => None,
        }
    }

    pub fn is_not_starting(&self) -> bool {
        matches!(self, Self::NotStarting)
    }
}

#[derive(Default)]
struct DocumentState {
    phase: LifecyclePhase,
    binding: Option<ActiveBinding>,
    liveness: CancellationToken,
    /// Held for the duration of a start so concurrent callers queue up
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

pub struct RuntimeLifecycleManager<R: RemoteApi, S: StateStore, C: Clock> {
    remote: Arc<R>,
    cache: CacheLayer<S, C>,
    bindings: BindingStore<S>,
    terminated: TerminatedFlags<S>,
    proxy: ConnectivityProxy,
    poller: ReadinessPoller<ConnectivityProxy>,
    dedup: ExecutionDedup<C>,
    config: EngineConfig,
    documents: Mutex<HashMap<DocumentId, DocumentState>>,
}

impl<R: RemoteApi, S: StateStore, C: Clock> RuntimeLifecycleManager<R, S, C> {
    pub fn new(deps: LifecycleDeps<R, S>, clock: C, config: EngineConfig) -> Self {
        let LifecycleDeps { remote, store, proxy } = deps;
        let poller = ReadinessPoller::new(Arc::new(proxy.clone())).grace(config.poll_grace);
        Self {
            remote,
            cache: CacheLayer::new(Arc::clone(&store), clock.clone()),
            bindings: BindingStore::new(Arc::clone(&store)),
            terminated: TerminatedFlags::new(store),
            proxy,
            poller,
            dedup: ExecutionDedup::new(clock, config.dedup_window),
            config,
            documents: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &CacheLayer<S, C> {
        &self.cache
    }

    pub fn proxy(&self) -> &ConnectivityProxy {
        &self.proxy
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self, document_id: &DocumentId) -> LifecyclePhase {
        self.documents.lock().get(document_id).map(|state| state.phase).unwrap_or_default()
    }

    pub fn binding(&self, document_id: &DocumentId) -> Option<ActiveBinding> {
        self.documents.lock().get(document_id).and_then(|state| state.binding.clone())
    }

    /// Make sure `document_id` has a ready runtime, creating one from the
    /// configured default environment if needed.
    pub async fn ensure_runtime(
        &self,
        document_id: &DocumentId,
    ) -> Result<EnsureOutcome, LifecycleError> {
        let mut request = CreateRuntime::new(self.config.default_environment.clone());
        if let Some(credits) = self.config.default_credits {
            request = request.credits(credits);
        }
        self.ensure_runtime_with(document_id, request).await
    }

    pub async fn ensure_runtime_with(
        &self,
        document_id: &DocumentId,
        request: CreateRuntime,
    ) -> Result<EnsureOutcome, LifecycleError> {
        if let Some(binding) = self.ready_binding(document_id) {
            return Ok(EnsureOutcome::Ready(binding));
        }
        if self.terminated.is_set(document_id).await? {
            tracing::info!(
                document = %document_id,
                "runtime was terminated by the user, not starting"
            );
            return Ok(EnsureOutcome::NotStarting);
        }

        let in_flight = self.in_flight_guard(document_id);
        let _guard = in_flight.lock().await;

        // Whoever held the guard before us may have finished the job
        if let Some(binding) = self.ready_binding(document_id) {
            return Ok(EnsureOutcome::Ready(binding));
        }
        if self.terminated.is_set(document_id).await? {
            return Ok(EnsureOutcome::NotStarting);
        }

        let cancel = self.liveness(document_id);
        if let Some(binding) = self.adopt_persisted(document_id, &cancel).await? {
            return Ok(EnsureOutcome::Ready(binding));
        }
        self.start_runtime(document_id, request, &cancel).await.map(EnsureOutcome::Ready)
    }

    /// Terminate the document's runtime at the user's request.
    ///
    /// The sticky terminated flag is set first, so nothing restarts the
    /// runtime until [`Self::clear_terminated`]. A failed remote delete is
    /// returned after local cleanup; the record stays cached as
    /// `Terminating` for a later sync to confirm.
    pub async fn terminate(&self, document_id: &DocumentId) -> Result<(), LifecycleError> {
        self.terminated.set(document_id).await?;
        let binding = {
            let mut documents = self.documents.lock();
            let state = documents.entry(document_id.clone()).or_default();
            state.liveness.cancel();
            state.phase = LifecyclePhase::Terminating;
            state.binding.take()
        };
        tracing::info!(document = %document_id, "terminating runtime");

        let runtime_id = match &binding {
            Some(binding) => Some(binding.runtime_id().clone()),
            None => self.bindings.get(document_id).await?,
        };
        if let Some(binding) = &binding {
            if let Err(e) = self.proxy.dispose(&binding.handle).await {
                tracing::warn!(
                    document = %document_id,
                    error = %e,
                    "failed to dispose connectivity, continuing cleanup"
                );
            }
        }

        let Some(runtime_id) = runtime_id else {
            self.force_phase(document_id, LifecyclePhase::Terminated);
            return Ok(());
        };

        if let Some(mut record) = self.cache.runtime(&runtime_id).await {
            if record.advance(RuntimeStatus::Terminating).is_ok() {
                if let Err(e) = self.cache.set_runtime(&record).await {
                    tracing::warn!(
                        runtime = %runtime_id,
                        error = %e,
                        "failed to cache terminating status"
                    );
                }
            }
        }

        let deleted = self.remote.delete_runtime(&runtime_id).await;
        self.bindings.remove(document_id).await?;
        match deleted {
            Ok(()) => {
                self.cache.remove_runtime(&runtime_id).await?;
                self.force_phase(document_id, LifecyclePhase::Terminated);
                tracing::info!(
                    document = %document_id,
                    runtime = %runtime_id,
                    "runtime terminated"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    document = %document_id,
                    runtime = %runtime_id,
                    error = %e,
                    "remote delete failed"
                );
                Err(e.into())
            }
        }
    }

    /// Allow automatic starts for the document again.
    pub async fn clear_terminated(&self, document_id: &DocumentId) -> Result<(), LifecycleError> {
        self.terminated.clear(document_id).await?;
        let mut documents = self.documents.lock();
        if let Some(state) = documents.get_mut(document_id) {
            if state.phase == LifecyclePhase::Terminated {
                state.phase = LifecyclePhase::Uninitialized;
            }
        }
        Ok(())
    }

    /// Forget the document's connection without deleting its runtime.
    ///
    /// In-flight starts are cancelled. The persisted binding is kept so the
    /// next [`Self::ensure_runtime`] reconnects instead of creating.
    pub async fn close_document(&self, document_id: &DocumentId) {
        let binding = {
            let mut documents = self.documents.lock();
            let Some(state) = documents.get_mut(document_id) else {
                return;
            };
            state.liveness.cancel();
            state.phase = LifecyclePhase::Uninitialized;
            state.binding.take()
        };
        if let Some(binding) = binding {
            if let Err(e) = self.proxy.dispose(&binding.handle).await {
                tracing::warn!(
                    document = %document_id,
                    error = %e,
                    "failed to dispose connectivity"
                );
            }
        }
        tracing::info!(document = %document_id, "document closed");
    }

    /// Environments runtimes can be created from, cached for an hour.
    pub async fn environments(&self) -> Result<Vec<Environment>, LifecycleError> {
        if let Some(environments) = self.cache.environments().await {
            return Ok(environments);
        }
        let environments = self.remote.environments().await?;
        if let Err(e) = self.cache.set_environments(environments.clone()).await {
            tracing::warn!(error = %e, "failed to cache environments");
        }
        Ok(environments)
    }

    /// Run a mutating operation unless an identical one ran within the
    /// dedup window. A failed run does not count.
    pub async fn run_deduplicated<T, E, F>(
        &self,
        operation: &str,
        args: &serde_json::Value,
        run: F,
    ) -> Result<Dedup<T>, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let signature = ExecutionDedup::<C>::signature(operation, args);
        if !self.dedup.try_begin(&signature) {
            tracing::info!(
                operation,
                signature = nbr_core::short(&signature, 12),
                "duplicate operation skipped"
            );
            return Ok(Dedup::Duplicate);
        }
        match run.await {
            Ok(value) => Ok(Dedup::Executed(value)),
            Err(e) => {
                self.dedup.forget(&signature);
                Err(e)
            }
        }
    }

    /// Tear everything down: cancel in-flight starts, drop every connection,
    /// and reset instance-scoped state. Runtimes stay alive remotely.
    pub async fn shutdown(&self) {
        let bindings: Vec<ActiveBinding> = {
            let mut documents = self.documents.lock();
            documents
                .values_mut()
                .filter_map(|state| {
                    state.liveness.cancel();
                    state.phase = LifecyclePhase::Uninitialized;
                    state.binding.take()
                })
                .collect()
        };
        for binding in &bindings {
            if let Err(e) = self.proxy.dispose(&binding.handle).await {
                tracing::warn!(
                    document = %binding.document_id,
                    error = %e,
                    "failed to dispose connectivity"
                );
            }
        }
        if let Err(e) = self.proxy.websocket_close_all().await {
            tracing::warn!(error = %e, "failed to close broker sockets");
        }
        self.proxy.clear();
        self.dedup.clear();
        tracing::info!(bindings = bindings.len(), "lifecycle manager shut down");
    }

    fn ready_binding(&self, document_id: &DocumentId) -> Option<ActiveBinding> {
        let documents = self.documents.lock();
        let state = documents.get(document_id)?;
        match state.phase {
            LifecyclePhase::Ready => state.binding.clone(),
            _ => None,
        }
    }

    fn in_flight_guard(&self, document_id: &DocumentId) -> Arc<tokio::sync::Mutex<()>> {
        let mut documents = self.documents.lock();
        Arc::clone(&documents.entry(document_id.clone()).or_default().in_flight)
    }

    /// The document's liveness token, replacing a cancelled one.
    fn liveness(&self, document_id: &DocumentId) -> CancellationToken {
        let mut documents = self.documents.lock();
        let state = documents.entry(document_id.clone()).or_default();
        if state.liveness.is_cancelled() {
            state.liveness = CancellationToken::new();
        }
        state.liveness.clone()
    }

    /// Set the phase unless the flow that wants it has been cancelled.
    fn set_phase(
        &self,
        document_id: &DocumentId,
        phase: LifecyclePhase,
        cancel: &CancellationToken,
    ) {
        let mut documents = self.documents.lock();
        if !cancel.is_cancelled() {
            documents.entry(document_id.clone()).or_default().phase = phase;
        }
    }

    fn force_phase(&self, document_id: &DocumentId, phase: LifecyclePhase) {
        self.documents.lock().entry(document_id.clone()).or_default().phase = phase;
    }

    /// Reuse the runtime a closed document was last bound to, if it is
    /// still cached and answers a probe.
    async fn adopt_persisted(
        &self,
        document_id: &DocumentId,
        cancel: &CancellationToken,
    ) -> Result<Option<ActiveBinding>, LifecycleError> {
        let Some(runtime_id) = self.bindings.get(document_id).await? else {
            return Ok(None);
        };
        let record = self.cache.runtime(&runtime_id).await.filter(RuntimeRecord::is_live);
        let alive = match &record {
            Some(RuntimeRecord { ingress_url: Some(url), token: Some(token), .. }) => {
                self.proxy.probe(url, token).await
            }
            _ => false,
        };
        if cancel.is_cancelled() {
            return Err(LifecycleError::Cancelled(document_id.clone()));
        }

        match record {
            Some(mut record) if alive => {
                if record.status == RuntimeStatus::Creating {
                    record.advance(RuntimeStatus::Running)?;
                    self.cache.set_runtime(&record).await?;
                }
                tracing::info!(
                    document = %document_id,
                    runtime = %runtime_id,
                    "reconnecting to existing runtime"
                );
                self.bind(document_id, record, cancel).await.map(Some)
            }
            _ => {
                tracing::info!(
                    document = %document_id,
                    runtime = %runtime_id,
                    "previous runtime gone, starting fresh"
                );
                self.bindings.remove(document_id).await?;
                Ok(None)
            }
        }
    }

    /// Create → await ready → bind.
    async fn start_runtime(
        &self,
        document_id: &DocumentId,
        request: CreateRuntime,
        cancel: &CancellationToken,
    ) -> Result<ActiveBinding, LifecycleError> {
        self.set_phase(document_id, LifecyclePhase::Creating, cancel);
        tracing::info!(
            document = %document_id,
            environment = %request.environment,
            "creating runtime"
        );

        let mut record = match self.remote.create_runtime(request).await {
            Ok(record) => record,
            Err(e) => {
                self.set_phase(document_id, LifecyclePhase::Error, cancel);
                tracing::warn!(document = %document_id, error = %e, "runtime creation failed");
                return Err(e.into());
            }
        };
        if cancel.is_cancelled() {
            return Err(self.abandon(document_id, record).await);
        }
        self.cache.set_runtime(&record).await?;

        let (Some(url), Some(token)) = (record.ingress_url.clone(), record.token.clone()) else {
            tracing::warn!(
                document = %document_id,
                runtime = %record.pod_name,
                "runtime has no ingress"
            );
            record.advance(RuntimeStatus::Error)?;
            self.cache.set_runtime(&record).await?;
            self.set_phase(document_id, LifecyclePhase::Error, cancel);
            return Err(LifecycleError::NoIngress(record.pod_name));
        };

        self.set_phase(document_id, LifecyclePhase::AwaitingReady, cancel);
        let outcome = self
            .poller
            .poll_until(&url, &token, self.config.poll_timeout, self.config.poll_interval, cancel)
            .await;
        match outcome {
            PollOutcome::Ready => {}
            PollOutcome::TimedOut => {
                tracing::warn!(
                    document = %document_id,
                    runtime = %record.pod_name,
                    "runtime not ready in time, proceeding optimistically"
                );
            }
            PollOutcome::Cancelled => return Err(self.abandon(document_id, record).await),
        }

        if cancel.is_cancelled() {
            return Err(self.abandon(document_id, record).await);
        }
        record.advance(RuntimeStatus::Running)?;
        self.cache.set_runtime(&record).await?;
        self.bind(document_id, record, cancel).await
    }

    /// Attach connectivity for `record` to the document, replacing (and
    /// disposing) any prior binding, and persist the association.
    ///
    /// A cancellation seen at any point hands the runtime to [`Self::abandon`].
    async fn bind(
        &self,
        document_id: &DocumentId,
        record: RuntimeRecord,
        cancel: &CancellationToken,
    ) -> Result<ActiveBinding, LifecycleError> {
        let prior = self
            .documents
            .lock()
            .get_mut(document_id)
            .and_then(|state| state.binding.take());
        if let Some(prior) = prior {
            if let Err(e) = self.proxy.dispose(&prior.handle).await {
                tracing::warn!(
                    document = %document_id,
                    runtime = %prior.runtime_id(),
                    error = %e,
                    "failed to dispose prior connectivity"
                );
            }
        }

        if cancel.is_cancelled() {
            return Err(self.abandon(document_id, record).await);
        }
        self.bindings.put(document_id, record.id()).await?;
        let handle = Arc::new(self.proxy.bind(&record)?);
        let binding = ActiveBinding { document_id: document_id.clone(), runtime: record, handle };
        let installed = {
            let mut documents = self.documents.lock();
            if cancel.is_cancelled() {
                false
            } else {
                let state = documents.entry(document_id.clone()).or_default();
                state.phase = LifecyclePhase::Ready;
                state.binding = Some(binding.clone());
                true
            }
        };
        if !installed {
            if let Err(e) = self.proxy.dispose(&binding.handle).await {
                tracing::warn!(
                    document = %document_id,
                    error = %e,
                    "failed to dispose connectivity"
                );
            }
            return Err(self.abandon(document_id, binding.runtime).await);
        }
        tracing::info!(document = %document_id, runtime = %binding.runtime_id(), "runtime bound");
        Ok(binding)
    }

    /// Settle a runtime whose start was cancelled after it was created.
    ///
    /// If the user terminated the document meanwhile the runtime is deleted;
    /// otherwise it is kept (cached and bound on disk) for the next reopen.
    async fn abandon(&self, document_id: &DocumentId, record: RuntimeRecord) -> LifecycleError {
        let terminated = match self.terminated.is_set(document_id).await {
            Ok(terminated) => terminated,
            Err(e) => {
                tracing::warn!(
                    document = %document_id,
                    error = %e,
                    "failed to read terminated flag"
                );
                false
            }
        };

        if terminated {
            tracing::info!(
                document = %document_id,
                runtime = %record.pod_name,
                "deleting runtime created after termination"
            );
            if let Err(e) = self.bindings.remove(document_id).await {
                tracing::warn!(
                    document = %document_id,
                    error = %e,
                    "failed to drop persisted binding"
                );
            }
            match self.remote.delete_runtime(record.id()).await {
                Ok(()) => {
                    if let Err(e) = self.cache.remove_runtime(record.id()).await {
                        tracing::warn!(
                            runtime = %record.pod_name,
                            error = %e,
                            "failed to drop cached runtime"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        runtime = %record.pod_name,
                        error = %e,
                        "failed to delete abandoned runtime"
                    );
                    let mut record = record;
                    if record.advance(RuntimeStatus::Terminating).is_ok() {
                        if let Err(e) = self.cache.set_runtime(&record).await {
                            tracing::warn!(
                                runtime = %record.pod_name,
                                error = %e,
                                "failed to cache terminating status"
                            );
                        }
                    }
                }
            }
        } else {
            tracing::info!(
                document = %document_id,
                runtime = %record.pod_name,
                "start cancelled, keeping runtime for reconnect"
            );
            if let Err(e) = self.cache.set_runtime(&record).await {
                tracing::warn!(runtime = %record.pod_name, error = %e, "failed to cache runtime");
            }
            if let Err(e) = self.bindings.put(document_id, record.id()).await {
                tracing::warn!(document = %document_id, error = %e, "failed to persist binding");
            }
        }
        LifecycleError::Cancelled(document_id.clone())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
