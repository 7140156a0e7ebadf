// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! reqwest-backed [`RemoteApi`] client.

use super::{CreateRuntime, RemoteApi, RemoteApiError};
use crate::credential::Credentials;
use async_trait::async_trait;
use nbr_core::{Clock, Environment, RuntimeId, RuntimeRecord, RuntimeStatus, SystemClock};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const RUNTIMES_PATH: &str = "/api/runtimes/v1/runtimes";
const ENVIRONMENTS_PATH: &str = "/api/runtimes/v1/environments";

pub struct HttpRemoteApi<C: Clock = SystemClock> {
    base_url: String,
    token: String,
    timeout: Duration,
    http: reqwest::Client,
    clock: C,
}

impl HttpRemoteApi<SystemClock> {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_clock(credentials, SystemClock)
    }
}

impl<C: Clock> HttpRemoteApi<C> {
    pub fn with_clock(credentials: Credentials, clock: C) -> Self {
        Self {
            base_url: credentials.base_url.trim().trim_end_matches('/').to_string(),
            token: credentials.token,
            timeout: DEFAULT_TIMEOUT,
            http: reqwest::Client::new(),
            clock,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteApiError> {
        let response = request
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RemoteApiError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteApiError::Auth { status: status.as_u16() });
        }
        let bytes = response.bytes().await.map_err(|e| RemoteApiError::Network(e.to_string()))?;
        let value: Option<serde_json::Value> = serde_json::from_slice(&bytes).ok();

        if let Some(value) = &value {
            if value.get("success").and_then(|v| v.as_bool()) == Some(false) {
                let message = value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("request rejected");
                return Err(RemoteApiError::Api(message.to_string()));
            }
        }
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).trim().to_string();
            return Err(RemoteApiError::Http { status: status.as_u16(), body });
        }
        let value = value.ok_or_else(|| RemoteApiError::Decode("response is not JSON".into()))?;
        serde_json::from_value(value).map_err(|e| RemoteApiError::Decode(e.to_string()))
    }
}

#[derive(Serialize)]
struct CreateBody<'a> {
    environment_name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    given_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credits_limit: Option<f64>,
}

#[derive(Deserialize)]
struct RuntimeBody {
    runtime: RuntimePayload,
}

#[derive(Deserialize)]
struct RuntimesBody {
    #[serde(default)]
    runtimes: Vec<RuntimePayload>,
}

#[derive(Deserialize)]
struct EnvironmentsBody {
    #[serde(default)]
    environments: Vec<Environment>,
}

#[derive(Deserialize)]
struct Empty {}

/// Runtime as the platform reports it. Timestamps are epoch seconds.
#[derive(Deserialize)]
struct RuntimePayload {
    pod_name: String,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default, alias = "environment")]
    environment_name: String,
    #[serde(default)]
    ingress: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    burning_rate: Option<f64>,
    #[serde(default, alias = "credits_limit")]
    credits: Option<f64>,
    #[serde(default)]
    credits_used: Option<f64>,
    #[serde(default)]
    started_at: Option<f64>,
    #[serde(default)]
    expired_at: Option<f64>,
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).max(0.0) as u64
}

impl RuntimePayload {
    fn into_record(self, status: RuntimeStatus, now_ms: u64) -> RuntimeRecord {
        let started_at_ms = self.started_at.map(secs_to_ms);
        let created_at_ms = started_at_ms.unwrap_or(now_ms);
        let mut record = RuntimeRecord::new(self.pod_name, self.environment_name, created_at_ms);
        record.status = status;
        record.uid = self.uid;
        record.given_name = self.given_name;
        record.ingress_url = self.ingress.filter(|s| !s.is_empty());
        record.token = self.token.filter(|s| !s.is_empty());
        record.burning_rate = self.burning_rate;
        record.max_credits = self.credits;
        record.credits_used = self.credits_used.unwrap_or(0.0);
        record.started_at_ms = started_at_ms;
        record.expired_at_ms = self.expired_at.map(secs_to_ms);
        record
    }
}

#[async_trait]
impl<C: Clock> RemoteApi for HttpRemoteApi<C> {
    async fn create_runtime(
        &self,
        request: CreateRuntime,
    ) -> Result<RuntimeRecord, RemoteApiError> {
        let body = CreateBody {
            environment_name: &request.environment,
            kind: "notebook",
            given_name: request.given_name.as_deref(),
            credits_limit: request.credits,
        };
        let request = self.http.post(self.endpoint(RUNTIMES_PATH)).json(&body);
        let created: RuntimeBody = self.send(request).await?;
        let record = created.runtime.into_record(RuntimeStatus::Creating, self.clock.epoch_ms());
        tracing::info!(
            pod = %record.pod_name,
            environment = %record.environment,
            "runtime created"
        );
        Ok(record)
    }

    async fn delete_runtime(&self, pod_name: &RuntimeId) -> Result<(), RemoteApiError> {
        let url = format!("{}/{}", self.endpoint(RUNTIMES_PATH), pod_name);
        let _: Empty = self.send(self.http.delete(url)).await?;
        tracing::info!(pod = %pod_name, "runtime deleted");
        Ok(())
    }

    async fn list_user_runtimes(&self) -> Result<Vec<RuntimeRecord>, RemoteApiError> {
        let listed: RuntimesBody = self.send(self.http.get(self.endpoint(RUNTIMES_PATH))).await?;
        let now_ms = self.clock.epoch_ms();
        Ok(listed
            .runtimes
            .into_iter()
            .map(|payload| payload.into_record(RuntimeStatus::Running, now_ms))
            .collect())
    }

    async fn environments(&self) -> Result<Vec<Environment>, RemoteApiError> {
        let listed: EnvironmentsBody =
            self.send(self.http.get(self.endpoint(ENVIRONMENTS_PATH))).await?;
        Ok(listed.environments)
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
