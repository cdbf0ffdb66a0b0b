//! Session module
//!
//! The current user's local, derived view of their conversations:
//! - `model` - User, chat entries, read markers, sort order
//! - `state` - `SessionState` derivation and persistence
//! - `directory` - Pseudo-user directory, random nicknames, search

pub mod directory;
pub mod model;
pub mod state;

pub use directory::SearchOutcome;
pub use model::{ChatEntry, ChatMeta, SortOrder, User};
pub use state::SessionState;
