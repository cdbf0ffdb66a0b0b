//! Key-value store abstraction with change notifications

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the change notification channel of the bundled stores
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Identity of one client context (one "tab") writing to a shared store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(uuid::Uuid);

impl ContextId {
    /// Generate a fresh random context id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification published after a key was written or removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// Key that changed
    pub key: String,
    /// Context that performed the write
    pub origin: ContextId,
}

/// String-keyed persistent store shared by every client context
///
/// Writes are immediately visible to every other holder of the store, and
/// every successful `set`/`remove` is published to all subscribers.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str, origin: ContextId) -> Result<()>;

    /// Remove `key` (no-op if absent)
    fn remove(&self, key: &str, origin: ContextId) -> Result<()>;

    /// Subscribe to change notifications
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// A store bound to the context that writes through it
///
/// Every write made through a handle is tagged with the handle's context,
/// which lets that context ignore notifications about its own writes.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn KeyValueStore>,
    origin: ContextId,
}

impl StoreHandle {
    /// Bind `store` to the given context
    pub fn new(store: Arc<dyn KeyValueStore>, origin: ContextId) -> Self {
        Self { store, origin }
    }

    /// Context this handle writes as
    pub fn origin(&self) -> ContextId {
        self.origin
    }

    /// Read the value stored under `key`
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    /// Store `value` under `key`
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.set(key, value, self.origin)
    }

    /// Remove `key`
    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key, self.origin)
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle").field("origin", &self.origin).finish()
    }
}
