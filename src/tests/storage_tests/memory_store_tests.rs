// Memory Store Tests - Testing MemoryStore and StoreHandle

use crate::storage::{ContextId, KeyValueStore, MemoryStore, StoreHandle};
use std::sync::Arc;

#[test]
fn test_set_get_remove() {
    let store = MemoryStore::new();
    let origin = ContextId::new();

    assert!(store.is_empty());
    assert_eq!(store.get("k").expect("get failed"), None);

    store.set("k", "v1", origin).expect("set failed");
    assert_eq!(store.get("k").expect("get failed").as_deref(), Some("v1"));

    store.set("k", "v2", origin).expect("set failed");
    assert_eq!(store.get("k").expect("get failed").as_deref(), Some("v2"));
    assert_eq!(store.len(), 1);

    store.remove("k", origin).expect("remove failed");
    assert_eq!(store.get("k").expect("get failed"), None);

    // Removing again is a no-op
    store.remove("k", origin).expect("remove failed");
}

#[test]
fn test_handles_share_one_store() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let tab_a = StoreHandle::new(store.clone(), ContextId::new());
    let tab_b = StoreHandle::new(store, ContextId::new());

    tab_a.set("shared", "from a").expect("set failed");
    assert_eq!(tab_b.get("shared").expect("get failed").as_deref(), Some("from a"));
    assert_ne!(tab_a.origin(), tab_b.origin());
}

#[test]
fn test_change_notifications_carry_origin() {
    tokio_test::block_on(async {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let writer = StoreHandle::new(store.clone(), ContextId::new());
        let mut changes = store.subscribe();

        writer.set("chatEX-server", "{}").expect("set failed");
        writer.remove("chatEX-server").expect("remove failed");

        let first = changes.recv().await.expect("missing set notification");
        assert_eq!(first.key, "chatEX-server");
        assert_eq!(first.origin, writer.origin());

        let second = changes.recv().await.expect("missing remove notification");
        assert_eq!(second.key, "chatEX-server");
    });
}

#[test]
fn test_removing_absent_key_is_silent() {
    tokio_test::block_on(async {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();

        store.remove("missing", ContextId::new()).expect("remove failed");
        assert!(changes.try_recv().is_err());
    });
}
