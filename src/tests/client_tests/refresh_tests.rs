// Refresh Tests - Testing the auto-refresh timer and cross-context notifications

use super::helpers::{client, logged_in, send, shared_store, wait_for_snapshot};
use crate::client::Notice;
use crate::storage::{ContextId, KeyValueStore};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_auto_refresh_at_most_one_timer() {
    let store = shared_store();
    let alice = logged_in(&store, "Alice").await;
    assert_eq!(alice.active_timer_count().await, 0);

    let notice = alice.set_auto_refresh(5_000).await.expect("Failed to set");
    assert_eq!(notice, Notice::AutoRefreshEvery(5_000));
    assert_eq!(notice.to_string(), "Auto refresh every 5 seconds");
    assert_eq!(alice.active_timer_count().await, 1);

    // Reconfiguring replaces the timer
    alice.set_auto_refresh(10_000).await.expect("Failed to set");
    assert_eq!(alice.active_timer_count().await, 1);

    let notice = alice.set_auto_refresh(0).await.expect("Failed to set");
    assert_eq!(notice, Notice::AutoRefreshOff);
    assert_eq!(notice.to_string(), "Auto refresh off");
    assert_eq!(alice.active_timer_count().await, 0);
    assert_eq!(alice.session().await.auto_refresh_ms, 0);
}

#[tokio::test(start_paused = true)]
async fn test_login_starts_requested_timer() {
    let store = shared_store();
    let alice = client(&store, "session-alice");
    alice.login("Alice", "pw", 30_000).await.expect("Failed to log in");

    assert_eq!(alice.active_timer_count().await, 1);
    assert_eq!(alice.session().await.auto_refresh_ms, 30_000);
}

#[tokio::test(start_paused = true)]
async fn test_auto_refresh_picks_up_server_changes() {
    let store = shared_store();
    let bob = logged_in(&store, "Bob").await;
    let mut snapshots = bob.subscribe();
    snapshots.borrow_and_update();

    bob.set_auto_refresh(5_000).await.expect("Failed to set");

    let alice = logged_in(&store, "Alice").await;
    send(&alice, "Bob", "hi").await;

    // Paused time advances to the next tick once everything else is idle
    let snapshot = wait_for_snapshot(&mut snapshots, |s| !s.chats.is_empty()).await;
    assert_eq!(snapshot.chats[0].preview, "hi");
    assert!(snapshot.chats[0].has_new);
}

#[tokio::test(start_paused = true)]
async fn test_no_refresh_before_first_interval() {
    let store = shared_store();
    let bob = logged_in(&store, "Bob").await;
    let mut snapshots = bob.subscribe();
    snapshots.borrow_and_update();

    bob.set_auto_refresh(5_000).await.expect("Failed to set");
    tokio::time::advance(Duration::from_millis(4_000)).await;
    tokio::task::yield_now().await;
    assert!(!snapshots.has_changed().expect("Snapshot channel closed"));

    tokio::time::advance(Duration::from_millis(1_500)).await;
    snapshots
        .changed()
        .await
        .expect("Snapshot channel closed");
}

#[tokio::test]
async fn test_storage_change_from_other_context_refreshes() {
    let store = shared_store();
    let bob = logged_in(&store, "Bob").await;
    bob.watch_storage().await;
    let mut snapshots = bob.subscribe();

    let alice = logged_in(&store, "Alice").await;
    send(&alice, "Bob", "hi").await;

    let snapshot = wait_for_snapshot(&mut snapshots, |s| {
        s.chats.len() == 1 && s.chats[0].preview == "hi"
    })
    .await;
    assert!(snapshot.chats[0].has_new);
    assert_eq!(snapshot.chats[0].partner, "Alice");
}

#[tokio::test]
async fn test_own_writes_and_unrelated_keys_are_ignored() {
    let store = shared_store();
    let alice = logged_in(&store, "Alice").await;
    alice.watch_storage().await;
    let mut snapshots = alice.subscribe();
    snapshots.borrow_and_update();

    // Own write to the server record
    alice.server().ensure_user_registered("Zed").expect("Failed to register");
    // Someone else's write to an unrelated key
    store
        .set("unrelated", "x", ContextId::new())
        .expect("set failed");

    let quiet = tokio::time::timeout(Duration::from_millis(100), snapshots.changed()).await;
    assert!(quiet.is_err(), "Unexpected refresh");

    // Another context writing the server record does trigger a refresh
    store
        .set("chatEX-server", r#"{"users":["Alice","Zed","Yuna"]}"#, ContextId::new())
        .expect("set failed");
    tokio::time::timeout(Duration::from_secs(5), snapshots.changed())
        .await
        .expect("No refresh after foreign write")
        .expect("Snapshot channel closed");
    assert!(alice.session().await.directory.contains(&"Yuna".to_string()));
}

#[tokio::test]
async fn test_stop_watching() {
    let store = shared_store();
    let alice = logged_in(&store, "Alice").await;
    alice.watch_storage().await;
    alice.stop_watching().await;
    let mut snapshots = alice.subscribe();
    snapshots.borrow_and_update();

    store
        .set("chatEX-server", r#"{"users":["Alice","Yuna"]}"#, ContextId::new())
        .expect("set failed");

    let quiet = tokio::time::timeout(Duration::from_millis(100), snapshots.changed()).await;
    assert!(quiet.is_err(), "Refresh after stop_watching");
}

#[tokio::test]
async fn test_shared_session_contexts_settle() {
    let store = shared_store();
    let first_tab = logged_in(&store, "Bob").await;
    let second_tab = client(&store, "session-bob");
    assert!(second_tab.restore().await.expect("Failed to restore"));
    first_tab.watch_storage().await;
    second_tab.watch_storage().await;

    let alice = logged_in(&store, "Alice").await;
    let id = send(&alice, "Bob", "hi").await;

    let mut first_rx = first_tab.subscribe();
    let mut second_rx = second_tab.subscribe();
    wait_for_snapshot(&mut first_rx, |s| !s.chats.is_empty()).await;
    wait_for_snapshot(&mut second_rx, |s| !s.chats.is_empty()).await;

    // Both tabs open the conversation; each read persists the shared session
    first_tab.open_conversation(&id).await.expect("Failed to open");
    second_tab.open_conversation(&id).await.expect("Failed to open");

    // Eventually neither tab keeps rewriting the shared session record
    let mut changes = store.subscribe();
    tokio::time::sleep(Duration::from_millis(200)).await;
    while changes.try_recv().is_ok() {}
    let quiet = tokio::time::timeout(Duration::from_millis(200), changes.recv()).await;
    assert!(quiet.is_err(), "Contexts kept rewriting the store");
}
