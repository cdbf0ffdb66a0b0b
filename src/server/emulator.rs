//! Shared server record and the operations every context performs on it

use crate::{
    server::{conversation_key, same_nickname, Conversation, Message},
    storage::{codec, StoreHandle},
    Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The whole shared server record as stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Registered nicknames, in registration order
    #[serde(default, deserialize_with = "codec::lenient::seq")]
    pub users: Vec<String>,
    /// Conversations keyed by [`conversation_key`]
    ///
    /// Entries that cannot be read are dropped on load; the rest survive.
    #[serde(default, deserialize_with = "codec::lenient::map")]
    pub conversations: BTreeMap<String, Conversation>,
}

impl ServerRecord {
    /// Whether `nickname` is registered (case-insensitive)
    pub fn is_registered(&self, nickname: &str) -> bool {
        self.users.iter().any(|u| same_nickname(u, nickname))
    }

    /// Conversations `nickname` takes part in
    pub fn conversations_of<'a>(
        &'a self,
        nickname: &'a str,
    ) -> impl Iterator<Item = &'a Conversation> + 'a {
        self.conversations.values().filter(move |c| c.includes(nickname))
    }
}

/// Server emulator layered over the shared store
///
/// Every operation loads the full record, changes it and writes the full
/// record back. Nothing serializes these cycles across contexts: when two
/// contexts interleave, the last full write wins and the other change is lost.
#[derive(Debug, Clone)]
pub struct ServerEmulator {
    store: StoreHandle,
    key: String,
}

impl ServerEmulator {
    /// Create an emulator reading and writing the record under `key`
    pub fn new(store: StoreHandle, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Store key of the server record
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the current server record (empty if missing or malformed)
    pub fn snapshot(&self) -> ServerRecord {
        codec::load(&self.store, &self.key)
    }

    /// Overwrite the stored server record
    pub fn save(&self, record: &ServerRecord) -> Result<()> {
        codec::save(&self.store, &self.key, record)
    }

    /// Register `nickname` unless a case-insensitive match already exists
    ///
    /// Returns the record as it stands afterwards.
    pub fn ensure_user_registered(&self, nickname: &str) -> Result<ServerRecord> {
        let mut record = self.snapshot();
        if !record.is_registered(nickname) {
            record.users.push(nickname.to_string());
            self.save(&record)?;
            tracing::info!("Registered user {}", nickname);
        }
        Ok(record)
    }

    /// Get or create the conversation between `current_user` and `partner`
    ///
    /// A new conversation starts empty, stamped now, and is persisted right
    /// away. Repeated calls for the same unordered pair return the same
    /// conversation.
    pub fn upsert_conversation(&self, current_user: &str, partner: &str) -> Result<Conversation> {
        let mut record = self.snapshot();
        let id = conversation_key(current_user, partner);

        if let Some(existing) = record.conversations.get(&id) {
            return Ok(existing.clone());
        }

        let conversation = Conversation::new(current_user, partner);
        record.conversations.insert(id.clone(), conversation.clone());
        self.save(&record)?;
        tracing::debug!("Created conversation {}", id);
        Ok(conversation)
    }

    /// Append a message from `sender` to the conversation with `partner`
    ///
    /// The conversation is created first if needed. The record is then
    /// re-read and the conversation entry replaced by the appended copy.
    pub fn push_message(
        &self,
        current_user: &str,
        partner: &str,
        content: &str,
        sender: &str,
    ) -> Result<Message> {
        let mut conversation = self.upsert_conversation(current_user, partner)?;
        let message = Message::new(content, sender);
        conversation.append_message(message.clone());

        let mut record = self.snapshot();
        record
            .conversations
            .insert(conversation.id.clone(), conversation);
        self.save(&record)?;

        tracing::debug!("Pushed message from {} to {}", sender, partner);
        Ok(message)
    }
}
