//! Shared persistent storage module
//!
//! This module handles the string-keyed store every client context shares:
//! - Key-value store abstraction and change notifications
//! - In-memory and SQLite-backed store implementations
//! - Typed record load/save with timestamp conversion
//!
//! The module is organized into submodules:
//! - `kv` - `KeyValueStore` trait, `StoreChange` notifications, `StoreHandle`
//! - `memory_store` - In-memory store (tests, single-process multi-context)
//! - `sqlite_store` - File-persistent SQLite store
//! - `codec` - Record load/save and ISO-8601 timestamp serde helpers

pub mod codec;
pub mod kv;
pub mod memory_store;
pub mod sqlite_store;

pub use kv::{ContextId, KeyValueStore, StoreChange, StoreHandle};
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
