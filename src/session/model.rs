//! Session-local records: user, derived chat entries, read markers

use crate::{
    server::{Conversation, Message},
    storage::codec::{self, iso_millis},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Display name and identity key
    pub nickname: String,
    /// Opaque password, never validated beyond being non-empty at login
    pub password: String,
}

/// Chat list ordering by last activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recent activity first
    #[default]
    Latest,
    /// Oldest activity first
    Oldest,
}

/// Per-conversation local read marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMeta {
    /// Time the conversation was last viewed (epoch if never)
    #[serde(default = "codec::epoch", with = "iso_millis")]
    pub last_read: DateTime<Utc>,
}

impl ChatMeta {
    /// Marker read at `at`
    pub fn read_at(at: DateTime<Utc>) -> Self {
        Self { last_read: at }
    }
}

impl Default for ChatMeta {
    fn default() -> Self {
        Self::read_at(codec::epoch())
    }
}

/// One conversation as the current user sees it
///
/// Derived from a server [`Conversation`] and the local [`ChatMeta`] on every
/// sync; never merged with an earlier version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    /// Conversation id
    pub id: String,
    /// The other participant (the user itself for a self-chat)
    pub partner: String,
    /// Conversation creation time
    #[serde(default = "codec::now_millis", with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    /// Messages in append order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Unread messages from someone else exist since the last-read marker
    #[serde(default)]
    pub has_new: bool,
}

impl ChatEntry {
    /// Derive the entry `nickname` sees for `conversation`
    ///
    /// `has_new` is set when any message authored by someone other than
    /// `nickname` is strictly newer than `meta.last_read`.
    pub fn derive(conversation: &Conversation, nickname: &str, meta: &ChatMeta) -> Self {
        let has_new = conversation
            .messages
            .iter()
            .any(|m| m.is_from_other_than(nickname) && m.timestamp > meta.last_read);

        Self {
            id: conversation.id.clone(),
            partner: conversation.partner_of(nickname),
            created_at: conversation.created_at_or_fallback(),
            messages: conversation.messages.clone(),
            has_new,
        }
    }

    /// Last message, if any
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Time of the last message, or creation time for an empty chat
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message()
            .map(|m| m.timestamp)
            .unwrap_or(self.created_at)
    }

    /// Mark chat as read
    pub fn mark_read(&mut self) {
        self.has_new = false;
    }
}
