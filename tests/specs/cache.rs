// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache expiry and recents specs

use crate::prelude::*;
use nbr_core::{ResourceKind, Space, SpaceId};
use nbr_storage::{keys, FileStore, StateStore};

fn cache() -> (CacheLayer<MemoryStore, FakeClock>, Arc<MemoryStore>, FakeClock) {
    let store = Arc::new(MemoryStore::new());
    let clock = FakeClock::new();
    (CacheLayer::new(Arc::clone(&store), clock.clone()), store, clock)
}

#[tokio::test]
async fn runtime_record_lives_five_minutes() {
    let (cache, store, clock) = cache();
    let pod = RuntimeId::new("pod-1");
    cache.set_runtime(&RuntimeRecord::builder("pod-1").build()).await.unwrap();

    clock.advance(Duration::from_secs(4 * 60 + 59));
    assert!(cache.runtime(&pod).await.is_some());

    clock.advance(Duration::from_secs(61));
    assert!(cache.runtime(&pod).await.is_none());
    assert_eq!(store.get(&keys::runtime("pod-1")).await.unwrap(), None);
}

#[tokio::test]
async fn entries_expire_exactly_at_ttl() {
    let (cache, store, clock) = cache();
    let space = Space {
        id: SpaceId::new("s1"),
        name: "Research".into(),
        description: None,
        updated_at_ms: None,
    };
    cache.set_spaces(vec![space]).await.unwrap();

    clock.advance(Duration::from_secs(30 * 60) - Duration::from_millis(1));
    assert_eq!(cache.spaces().await.map(|s| s.len()), Some(1));

    clock.advance(Duration::from_millis(1));
    assert!(cache.spaces().await.is_none());
    assert!(!store.has(keys::SPACES).await.unwrap());
}

#[tokio::test]
async fn recents_keep_twenty_newest() {
    let (cache, _store, _clock) = cache();
    for i in 0..25 {
        cache.add_recent(ResourceKind::Notebook, format!("n{i}"), None).await.unwrap();
    }

    let recent = cache.recent().await;
    assert_eq!(recent.len(), 20);
    assert_eq!(recent[0].id, "n24");
    assert_eq!(recent[19].id, "n5");
}

#[tokio::test]
async fn re_adding_recent_moves_it_to_front() {
    let (cache, _store, _clock) = cache();
    cache.add_recent(ResourceKind::Notebook, "a", Some("Old".into())).await.unwrap();
    cache.add_recent(ResourceKind::Document, "b", None).await.unwrap();
    cache.add_recent(ResourceKind::Notebook, "a", Some("New".into())).await.unwrap();

    let recent = cache.recent().await;
    let ids: Vec<&str> = recent.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(recent[0].name.as_deref(), Some("New"));
}

#[tokio::test]
async fn recents_survive_reopening_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let cache = CacheLayer::new(store, FakeClock::new());
        cache.add_recent(ResourceKind::Notebook, "n1", Some("Notes".into())).await.unwrap();
    }

    let cache = CacheLayer::new(Arc::new(FileStore::open(&path).unwrap()), FakeClock::new());
    let recent = cache.recent().await;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].name.as_deref(), Some("Notes"));
}
