// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote runtime record and its status machine.
//!
//! A runtime is an ephemeral pod created on behalf of a document. Status only
//! moves forward: `Creating → Running → Terminating → Terminated`, with
//! `Error` reachable from any live status. `Terminated` and `Error` absorb.

use crate::id::RuntimeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a remote runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    /// Create call accepted, pod not yet confirmed reachable
    Creating,
    /// Pod is serving (or assumed serving after a soft poll timeout)
    Running,
    /// Delete requested
    Terminating,
    /// Delete confirmed
    Terminated,
    /// Unrecoverable failure
    Error,
}

crate::simple_display! {
    RuntimeStatus {
        Creating => "creating",
        Running => "running",
        Terminating => "terminating",
        Terminated => "terminated",
        Error => "error",
    }
}

impl RuntimeStatus {
    /// Whether this status absorbs all further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Creating => 0,
            Self::Running => 1,
            Self::Terminating => 2,
            Self::Terminated => 3,
            Self::Error => 4,
        }
    }

    /// Whether `self → next` respects the monotonic ordering.
    ///
    /// Re-asserting the current status is always allowed.
    pub fn can_transition_to(self, next: RuntimeStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next == Self::Error || next.rank() > self.rank()
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("runtime {runtime}: invalid transition {from} -> {to}")]
pub struct TransitionError {
    pub runtime: RuntimeId,
    pub from: RuntimeStatus,
    pub to: RuntimeStatus,
}

/// Cached view of a remote runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeRecord {
    /// Pod name; the runtime's primary key
    pub pod_name: RuntimeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Display name chosen at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    pub status: RuntimeStatus,
    /// Environment name the pod was created from
    pub environment: String,
    /// Network-reachable base URL of the pod's server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_url: Option<String>,
    /// Server token for the ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub created_at_ms: u64,
    #[serde(default)]
    pub credits_used: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_credits: Option<f64>,
    /// Credits consumed per second while running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    /// Server-side expiry (credits exhausted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at_ms: Option<u64>,
}

impl RuntimeRecord {
    pub fn new(
        pod_name: impl Into<RuntimeId>,
        environment: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            pod_name: pod_name.into(),
            uid: None,
            given_name: None,
            status: RuntimeStatus::Creating,
            environment: environment.into(),
            ingress_url: None,
            token: None,
            created_at_ms: now_ms,
            credits_used: 0.0,
            max_credits: None,
            burning_rate: None,
            started_at_ms: None,
            expired_at_ms: None,
        }
    }

    crate::setters! {
        option {
            uid: String,
            given_name: String,
            ingress_url: String,
            token: String,
            max_credits: f64,
            burning_rate: f64,
            started_at_ms: u64,
            expired_at_ms: u64,
        }
    }

    pub fn id(&self) -> &RuntimeId {
        &self.pod_name
    }

    /// Move to `next`, enforcing the monotonic status order.
    pub fn advance(&mut self, next: RuntimeStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                runtime: self.pod_name.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Whether the runtime may still be serving.
    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Credits left before the server reclaims the pod, if a cap is known.
    pub fn remaining_credits(&self) -> Option<f64> {
        self.max_credits.map(|max| (max - self.credits_used).max(0.0))
    }

    /// Whether the server-side expiry has passed at `now_ms`.
    ///
    /// Without an explicit expiry, falls back to start time plus the time the
    /// remaining credits buy at the burning rate.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        if let Some(expired_at) = self.expired_at_ms {
            return now_ms >= expired_at;
        }
        match (self.started_at_ms, self.max_credits, self.burning_rate) {
            (Some(start), Some(max), Some(rate)) if rate > 0.0 => {
                let budget_ms = (max / rate * 1000.0) as u64;
                now_ms >= start.saturating_add(budget_ms)
            }
            _ => false,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct RuntimeRecordBuilder {
    record: RuntimeRecord,
}

#[cfg(any(test, feature = "test-support"))]
impl RuntimeRecordBuilder {
    pub fn status(mut self, status: RuntimeStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.record.environment = environment.into();
        self
    }

    pub fn ingress(mut self, url: impl Into<String>, token: impl Into<String>) -> Self {
        self.record.ingress_url = Some(url.into());
        self.record.token = Some(token.into());
        self
    }

    pub fn created_at_ms(mut self, ms: u64) -> Self {
        self.record.created_at_ms = ms;
        self
    }

    pub fn build(self) -> RuntimeRecord {
        self.record
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RuntimeRecord {
    /// Create a builder with test defaults: running, with an ingress.
    pub fn builder(pod_name: &str) -> RuntimeRecordBuilder {
        let mut record = RuntimeRecord::new(pod_name, "python-cpu-env", 1_000_000);
        record.status = RuntimeStatus::Running;
        record.ingress_url = Some(format!("https://ingress.test/{pod_name}"));
        record.token = Some(format!("token-{pod_name}"));
        RuntimeRecordBuilder { record }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
