// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential resolution for the remote runtime platform.
//!
//! The token-issuance flow lives elsewhere; this only finds what it left
//! behind. Resolution walks a fallback chain and returns the first complete
//! pair:
//!
//! ```text
//!   1. NBR_RUN_URL + NBR_TOKEN env vars
//!   2. ~/.config/nbr/credentials.json → {"run_url", "token"}
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Base URL and bearer token for the platform API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), token: token.into() }
    }

    /// Resolve from the host environment.
    pub fn resolve() -> Option<Self> {
        resolve_with(|name| std::env::var(name).ok(), default_credentials_path().as_deref())
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    run_url: Option<String>,
    token: Option<String>,
}

/// Fallback chain with injectable env lookup and file location.
pub fn resolve_with(
    env: impl Fn(&str) -> Option<String>,
    file: Option<&Path>,
) -> Option<Credentials> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    // 1. Environment variables
    if let (Some(url), Some(token)) = (non_empty(env("NBR_RUN_URL")), non_empty(env("NBR_TOKEN"))) {
        return Some(Credentials::new(url, token));
    }

    // 2. credentials.json file
    let content = std::fs::read_to_string(file?).ok()?;
    let parsed: CredentialsFile = match serde_json::from_str(&content) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable credentials file");
            return None;
        }
    };
    Some(Credentials::new(non_empty(parsed.run_url)?, non_empty(parsed.token)?))
}

/// `~/.config/nbr/credentials.json` (platform config dir).
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nbr").join("credentials.json"))
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
