//! SQLite-based key-value store
//!
//! Persists every key in a single table so the shared store survives restarts.
//! Change notifications reach subscribers within the same process.

use crate::{
    settings::Settings,
    storage::kv::{ContextId, KeyValueStore, StoreChange, CHANGE_CHANNEL_CAPACITY},
    Error, Result,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// SQLite-backed key-value store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    /// Create a new store with a database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store instance (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    /// Open the database configured in `settings`, creating parent directories
    pub fn open(settings: &Settings) -> Result<Self> {
        let path = Path::new(&settings.database_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create database directory: {}", e))
                })?;
            }
        }
        Self::new(path)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            changes: broadcast::channel(CHANGE_CHANNEL_CAPACITY).0,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// List all stored keys
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Last write time of `key` in Unix milliseconds
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let updated = conn
            .query_row(
                "SELECT updated_at FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(updated)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Storage(format!("Database lock poisoned: {}", e)))
    }

    fn publish(&self, key: &str, origin: ContextId) {
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            origin,
        });
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, origin: ContextId) -> Result<()> {
        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, Utc::now().timestamp_millis()],
            )?;
        }
        self.publish(key, origin);
        Ok(())
    }

    fn remove(&self, key: &str, origin: ContextId) -> Result<()> {
        let removed = {
            let conn = self.lock()?;
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?
        };
        if removed > 0 {
            self.publish(key, origin);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
