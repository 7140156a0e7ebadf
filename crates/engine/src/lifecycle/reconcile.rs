// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciling cached runtimes with the world.
//!
//! On startup, cached runtimes are probed and either rebound to their
//! documents or discarded. A sync compares the cache against what the
//! platform still reports and drops what it no longer knows about.

use super::{ActiveBinding, RuntimeLifecycleManager};
use crate::error::LifecycleError;
use nbr_adapters::RemoteApi;
use nbr_core::{Clock, DocumentId, LifecyclePhase, RuntimeId, RuntimeStatus};
use nbr_storage::StateStore;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectReport {
    /// Documents bound again to a live runtime
    pub reconnected: Vec<DocumentId>,
    /// Runtimes that failed the liveness probe and were dropped
    pub discarded: Vec<RuntimeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub refreshed: usize,
    /// Cached runtimes the platform no longer reports
    pub removed: Vec<RuntimeId>,
}

impl<R: RemoteApi, S: StateStore, C: Clock> RuntimeLifecycleManager<R, S, C> {
    /// Re-establish bindings for cached runtimes after a restart.
    ///
    /// Every cached runtime that is neither terminated nor errored is probed
    /// before its documents are rebound. Runtimes that fail the probe lose
    /// their cached record and persisted bindings, as do bindings whose
    /// runtime is no longer cached.
    pub async fn reconnect_on_startup(&self) -> Result<ReconnectReport, LifecycleError> {
        let persisted = self.bindings.all().await?;
        let records: Vec<_> =
            self.cache.list_runtimes().await.into_iter().filter(|r| r.is_live()).collect();

        if !records.is_empty() {
            info!("Reconnecting {} cached runtimes", records.len());
        }

        let mut report = ReconnectReport::default();
        let mut live = HashSet::new();
        for mut record in records {
            let alive = match (&record.ingress_url, &record.token) {
                (Some(url), Some(token)) => self.proxy.probe(url, token).await,
                _ => false,
            };
            if !alive {
                info!(runtime = %record.pod_name, "runtime unreachable, discarding");
                self.cache.remove_runtime(&record.pod_name).await?;
                self.bindings.remove_runtime(&record.pod_name).await?;
                report.discarded.push(record.pod_name);
                continue;
            }

            if record.status == RuntimeStatus::Creating {
                record.advance(RuntimeStatus::Running)?;
                self.cache.set_runtime(&record).await?;
            }
            live.insert(record.pod_name.clone());

            let documents = persisted.iter().filter(|(_, runtime)| **runtime == record.pod_name);
            for (document_id, _) in documents {
                let cancel = self.liveness(document_id);
                self.bind(document_id, record.clone(), &cancel).await?;
                info!(
                    document = %document_id,
                    runtime = %record.pod_name,
                    "reconnected after restart"
                );
                report.reconnected.push(document_id.clone());
            }
        }

        for (document_id, runtime_id) in &persisted {
            if !live.contains(runtime_id) && !report.discarded.contains(runtime_id) {
                warn!(
                    document = %document_id,
                    runtime = %runtime_id,
                    "binding to uncached runtime, dropping"
                );
                self.bindings.remove(document_id).await?;
            }
        }

        Ok(report)
    }

    /// Refresh cached runtimes from the platform's listing.
    ///
    /// Runtimes the platform no longer reports are removed from the cache,
    /// and any document bound to one loses its binding.
    pub async fn sync_runtimes(&self) -> Result<SyncReport, LifecycleError> {
        let listed = self.remote.list_user_runtimes().await?;
        let reported: HashSet<RuntimeId> = listed.iter().map(|r| r.pod_name.clone()).collect();
        let mut report = SyncReport::default();

        for mut record in listed {
            if let Some(cached) = self.cache.runtime(&record.pod_name).await {
                record.created_at_ms = cached.created_at_ms;
                record.ingress_url = record.ingress_url.or(cached.ingress_url);
                record.token = record.token.or(cached.token);
                // A pending delete is not undone by the listing
                if cached.status == RuntimeStatus::Terminating {
                    record.status = RuntimeStatus::Terminating;
                }
            }
            self.cache.set_runtime(&record).await?;
            report.refreshed += 1;
        }

        for cached in self.cache.list_runtimes().await {
            if reported.contains(&cached.pod_name) {
                continue;
            }
            info!(
                runtime = %cached.pod_name,
                status = %cached.status,
                "runtime no longer reported, removing"
            );
            self.cache.remove_runtime(&cached.pod_name).await?;
            self.bindings.remove_runtime(&cached.pod_name).await?;

            let stale: Vec<ActiveBinding> = {
                let mut documents = self.documents.lock();
                documents
                    .values_mut()
                    .filter(|state| {
                        state.binding.as_ref().is_some_and(|b| *b.runtime_id() == cached.pod_name)
                    })
                    .filter_map(|state| {
                        state.phase = LifecyclePhase::Uninitialized;
                        state.binding.take()
                    })
                    .collect()
            };
            for binding in stale {
                if let Err(e) = self.proxy.dispose(&binding.handle).await {
                    warn!(
                        document = %binding.document_id,
                        error = %e,
                        "failed to dispose connectivity"
                    );
                }
            }
            report.removed.push(cached.pod_name);
        }

        Ok(report)
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
