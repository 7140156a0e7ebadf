// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote runtime platform API.
//!
//! Creates, lists, and deletes runtimes (pods) and lists the environments
//! they can be created from. All calls are bearer-token authenticated.

mod http;

pub use http::HttpRemoteApi;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRemoteApi, RemoteCall};

use async_trait::async_trait;
use nbr_core::{Environment, RuntimeId, RuntimeRecord};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteApiError {
    #[error("authentication failed (HTTP {status})")]
    Auth { status: u16 },
    /// The platform answered `success: false`
    #[error("remote API error: {0}")]
    Api(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl RemoteApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Parameters for a new runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRuntime {
    pub environment: String,
    pub given_name: Option<String>,
    pub credits: Option<f64>,
}

impl CreateRuntime {
    pub fn new(environment: impl Into<String>) -> Self {
        Self { environment: environment.into(), given_name: None, credits: None }
    }

    nbr_core::setters! {
        option {
            given_name: String,
            credits: f64,
        }
    }
}

#[async_trait]
pub trait RemoteApi: Send + Sync + 'static {
    /// Ask the platform for a new runtime. The returned record is `Creating`.
    async fn create_runtime(&self, request: CreateRuntime) -> Result<RuntimeRecord, RemoteApiError>;

    async fn delete_runtime(&self, pod_name: &RuntimeId) -> Result<(), RemoteApiError>;

    /// Runtimes the platform currently reports for this user.
    async fn list_user_runtimes(&self) -> Result<Vec<RuntimeRecord>, RemoteApiError>;

    async fn environments(&self) -> Result<Vec<Environment>, RemoteApiError>;
}
