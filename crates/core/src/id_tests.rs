// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::BTreeMap;

#[test]
fn bindings_keyed_by_id_resolve_from_str() {
    let mut bindings = BTreeMap::new();
    bindings.insert(DocumentId::new("doc-1"), RuntimeId::new("pod-1"));
    assert_eq!(bindings.get("doc-1").map(RuntimeId::as_str), Some("pod-1"));
}

#[yare::parameterized(
    truncates = { "0123456789abcdef", 12, "0123456789ab" },
    shorter_than_limit = { "abc", 8, "abc" },
    multibyte = { "héllo", 2, "hé" },
)]
fn short_takes_leading_chars(input: &str, n: usize, expected: &str) {
    assert_eq!(short(input, n), expected);
}

#[test]
fn ids_serialize_as_plain_strings() {
    let id = SpaceId::new("space-1");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"space-1\"");
    let back: SpaceId = serde_json::from_str("\"space-1\"").unwrap();
    assert_eq!(back, id);
}

#[test]
fn generated_connection_ids_are_unique_and_prefixed() {
    let a = ConnectionId::generate();
    let b = ConnectionId::generate();
    assert_ne!(a, b);
    assert!(a.starts_with("ws-"));
    assert_eq!(a.len(), "ws-".len() + 32);
}
