//! In-memory key-value store

use crate::{
    storage::kv::{ContextId, KeyValueStore, StoreChange, CHANGE_CHANNEL_CAPACITY},
    Error, Result,
};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Key-value store held in process memory
///
/// Cloning an `Arc<MemoryStore>` into several clients gives them the same
/// shared store, the way browser tabs share one origin's storage.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self, key: &str, origin: ContextId) {
        // No subscribers is not an error
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            origin,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| Error::Storage(format!("Store lock poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, origin: ContextId) -> Result<()> {
        {
            let mut entries = self
                .entries
                .write()
                .map_err(|e| Error::Storage(format!("Store lock poisoned: {}", e)))?;
            entries.insert(key.to_string(), value.to_string());
        }
        self.publish(key, origin);
        Ok(())
    }

    fn remove(&self, key: &str, origin: ContextId) -> Result<()> {
        let removed = {
            let mut entries = self
                .entries
                .write()
                .map_err(|e| Error::Storage(format!("Store lock poisoned: {}", e)))?;
            entries.remove(key).is_some()
        };
        if removed {
            self.publish(key, origin);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
