//! Integration tests for shared storage across tabs
//!
//! Two views over one [`SharedStore`] play the part of two browser tabs.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::Duration;

use authlab_common::storage::{KeyValueStore, MemoryStore, SharedStore};

/// Validates storage-event delivery between tabs.
///
/// # Test Steps
/// 1. Tab B subscribes to foreign events
/// 2. Tab A writes, overwrites and removes a key
/// 3. Tab B sees three events in order, all from tab A
#[tokio::test]
async fn test_events_cross_tabs_in_order() {
    let shared = SharedStore::new(Arc::new(MemoryStore::new()));
    let tab_a = shared.view("tab-a");
    let tab_b = shared.view("tab-b");
    let mut events = tab_b.foreign_events();

    tab_a.set("token:news:news-web", "one").expect("set");
    tab_a.set("token:news:news-web", "two").expect("set");
    tab_a.remove("token:news:news-web").expect("remove");

    let mut seen = Vec::new();
    for _ in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event in time")
            .expect("store alive");
        assert_eq!(event.origin, "tab-a");
        seen.push(event.new_value);
    }
    assert_eq!(seen, vec![Some("one".to_string()), Some("two".to_string()), None]);
}

/// Validates that concurrent compare-and-swap on one key admits exactly one
/// winner, which is the basis of the cross-tab refresh lock.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lock_compare_and_swap_single_winner() {
    let shared = SharedStore::in_memory();

    let mut handles = Vec::new();
    for i in 0..16 {
        let view = shared.view(format!("tab-{i}"));
        handles.push(tokio::spawn(async move {
            view.compare_and_swap("auth:refresh:lock", None, Some(i.to_string().as_str())).expect("cas")
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("join") {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_clear_reaches_backend() {
    let backend = Arc::new(MemoryStore::new());
    let shared = SharedStore::new(backend.clone());
    let view = shared.view("tab");

    view.set("a", "1").expect("set");
    view.set("b", "2").expect("set");
    assert_eq!(backend.len(), 2);

    view.clear().expect("clear");
    assert!(backend.is_empty());
}
