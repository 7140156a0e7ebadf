// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
}

fn write_file(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn env_vars_win_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, r#"{"run_url":"https://file.test","token":"file-token"}"#);

    let creds = resolve_with(
        env_of(&[("NBR_RUN_URL", "https://env.test"), ("NBR_TOKEN", "env-token")]),
        Some(&path),
    )
    .unwrap();
    assert_eq!(creds, Credentials::new("https://env.test", "env-token"));
}

#[test]
fn partial_env_falls_back_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, r#"{"run_url":"https://file.test","token":"file-token"}"#);

    let creds = resolve_with(env_of(&[("NBR_TOKEN", "env-token")]), Some(&path)).unwrap();
    assert_eq!(creds.base_url, "https://file.test");
    assert_eq!(creds.token, "file-token");
}

#[yare::parameterized(
    empty_token   = { r#"{"run_url":"https://file.test","token":""}"# },
    missing_url   = { r#"{"token":"t"}"# },
    not_json      = { "run_url=https://file.test" },
)]
fn incomplete_file_resolves_nothing(content: &str) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, content);
    assert!(resolve_with(env_of(&[]), Some(&path)).is_none());
}

#[test]
fn missing_file_resolves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    assert!(resolve_with(env_of(&[]), Some(&dir.path().join("absent.json"))).is_none());
    assert!(resolve_with(env_of(&[]), None).is_none());
}

#[test]
fn debug_hides_token() {
    let rendered = format!("{:?}", Credentials::new("https://x.test", "very-secret"));
    assert!(rendered.contains("https://x.test"));
    assert!(!rendered.contains("very-secret"));
}
