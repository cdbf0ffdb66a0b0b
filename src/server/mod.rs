//! Server emulator module
//!
//! The "server" is one record in the shared store that every client context
//! reads and rewrites: the registered users list plus all conversations keyed
//! by participant pair. There is no real backend behind it.
//!
//! - `conversation` - Conversation and message records
//! - `emulator` - `ServerEmulator` operations over the shared store

pub mod conversation;
pub mod emulator;

pub use conversation::{Conversation, Message};
pub use emulator::{ServerEmulator, ServerRecord};

/// Separator between the two nicknames of a conversation key
pub const KEY_SEPARATOR: char = '|';

/// Canonical form of a nickname for identity comparisons
pub fn normalize_nickname(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive nickname equality
pub fn same_nickname(a: &str, b: &str) -> bool {
    normalize_nickname(a) == normalize_nickname(b)
}

/// Deterministic conversation id for the unordered pair `{a, b}`
///
/// Both nicknames are normalized, sorted and joined, so
/// `conversation_key(a, b) == conversation_key(b, a)` and letter case does
/// not matter.
pub fn conversation_key(a: &str, b: &str) -> String {
    let mut pair = [normalize_nickname(a), normalize_nickname(b)];
    pair.sort();
    format!("{}{}{}", pair[0], KEY_SEPARATOR, pair[1])
}
