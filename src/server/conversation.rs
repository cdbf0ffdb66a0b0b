//! Conversation and message records of the shared server

use crate::storage::codec::{self, iso_millis, iso_millis_option, lenient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message inside a conversation
///
/// Messages are immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message text
    pub content: String,
    /// Nickname of the author (empty if the record carried none)
    #[serde(default)]
    pub sender: String,
    /// Creation time
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(content: impl Into<String>, sender: impl Into<String>) -> Self {
        Self::with_timestamp(content, sender, codec::now_millis())
    }

    /// Create a message with an explicit timestamp
    pub fn with_timestamp(
        content: impl Into<String>,
        sender: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            sender: sender.into(),
            timestamp,
        }
    }

    /// Whether this message was written by someone other than `nickname`
    ///
    /// Messages without a sender count as nobody's.
    pub fn is_from_other_than(&self, nickname: &str) -> bool {
        !self.sender.is_empty() && !super::same_nickname(&self.sender, nickname)
    }
}

/// All messages exchanged between exactly two nicknames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Deterministic key of the participant pair, see [`super::conversation_key`]
    pub id: String,
    /// The two participants, in the order of first contact
    pub participants: [String; 2],
    /// Creation time (older records may lack it or carry an unreadable one)
    #[serde(default, with = "iso_millis_option")]
    pub created_at: Option<DateTime<Utc>>,
    /// Messages in append order; unreadable ones are skipped on load
    #[serde(default, deserialize_with = "lenient::seq")]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation started by `initiator` with `partner`
    pub fn new(initiator: impl Into<String>, partner: impl Into<String>) -> Self {
        let initiator = initiator.into();
        let partner = partner.into();
        Self {
            id: super::conversation_key(&initiator, &partner),
            participants: [initiator, partner],
            created_at: Some(codec::now_millis()),
            messages: Vec::new(),
        }
    }

    /// Append a message to this conversation
    pub fn append_message(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Whether `nickname` takes part in this conversation
    pub fn includes(&self, nickname: &str) -> bool {
        self.participants
            .iter()
            .any(|p| super::same_nickname(p, nickname))
    }

    /// The participant other than `nickname`, or `nickname` itself for a self-chat
    pub fn partner_of(&self, nickname: &str) -> String {
        self.participants
            .iter()
            .find(|p| !super::same_nickname(p, nickname))
            .cloned()
            .unwrap_or_else(|| nickname.to_string())
    }

    /// Creation time, falling back to the first message and then to now
    pub fn created_at_or_fallback(&self) -> DateTime<Utc> {
        self.created_at
            .or_else(|| self.messages.first().map(|m| m.timestamp))
            .unwrap_or_else(codec::now_millis)
    }

    /// Last message, if any
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
