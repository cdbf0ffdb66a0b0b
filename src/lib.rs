//! chatEX - session and state synchronization for a mock chat client
//!
//! This library provides the core of chatEX, a chat client without a real
//! backend. Several client contexts share one string-keyed persistent store:
//! one record in it emulates a server shared by every context, another holds
//! the logged-in user's local session. Contexts observe each other's writes
//! through store change notifications.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod server;
pub mod session;
pub mod settings;
pub mod storage;
pub mod view;

pub use client::{ChatClient, Notice, RefreshSnapshot};
pub use settings::Settings;

/// Result type alias for chatEX operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chatEX operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage operation error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Login attempted without a password
    #[error("Please enter a password.")]
    MissingPassword,

    /// Operation requires a logged-in user
    #[error("No user is logged in")]
    NotLoggedIn,

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Initialize the chatEX library with logging
pub fn init() {
    tracing_subscriber::fmt::init();
}

#[cfg(test)]
mod tests;
