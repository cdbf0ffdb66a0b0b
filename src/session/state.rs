//! Session state persistence and derivation

use crate::{
    server::{same_nickname, ServerRecord},
    session::{
        directory::{self, SearchOutcome},
        model::{ChatEntry, ChatMeta, SortOrder, User},
    },
    storage::{codec, StoreHandle},
    Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Directory size used when a stored session carries no directory
const DEFAULT_VARIANTS_PER_NAME: usize = 3;

fn default_directory() -> Vec<String> {
    directory::build_directory(DEFAULT_VARIANTS_PER_NAME)
}

/// The logged-in user's local view of their conversations
///
/// The chat list is derived from the server record and rebuilt wholesale on
/// every [`SessionState::sync_from_server`]. Read markers live only here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Logged-in user, `None` when logged out
    #[serde(default)]
    pub user: Option<User>,
    /// Derived chat list
    #[serde(default)]
    pub chats: Vec<ChatEntry>,
    /// Chat list ordering
    #[serde(default)]
    pub sort_order: SortOrder,
    /// Auto-refresh interval in milliseconds (0 = off)
    #[serde(default)]
    pub auto_refresh_ms: u64,
    /// Pseudo-user directory searched when starting a chat
    #[serde(default = "default_directory")]
    pub directory: Vec<String>,
    /// Read markers keyed by conversation id
    #[serde(default)]
    pub chat_meta: BTreeMap<String, ChatMeta>,
    /// Conversation currently open
    #[serde(skip)]
    pub active_chat_id: Option<String>,
    /// Nickname picked in the last search
    #[serde(skip)]
    pub selected_search: Option<String>,
}

impl SessionState {
    /// Create an empty, logged-out state
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the state for a fresh login of `user`
    pub fn start(&mut self, user: User, directory: Vec<String>) {
        *self = Self {
            user: Some(user),
            directory,
            ..Self::default()
        };
    }

    /// Nickname of the logged-in user
    pub fn nickname(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.nickname.as_str())
    }

    /// Whether a user is logged in
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Rebuild the chat list from the server record
    ///
    /// Keeps only conversations the user takes part in and recomputes every
    /// entry, including `has_new`, from scratch. Registered users are merged
    /// into the directory. Returns `false` without touching anything when no
    /// user is logged in.
    pub fn sync_from_server(&mut self, record: &ServerRecord) -> bool {
        let Some(nickname) = self.nickname().map(str::to_string) else {
            return false;
        };

        let default_meta = ChatMeta::default();
        self.chats = record
            .conversations_of(&nickname)
            .map(|conv| {
                let meta = self.chat_meta.get(&conv.id).unwrap_or(&default_meta);
                ChatEntry::derive(conv, &nickname, meta)
            })
            .collect();

        let merged: Vec<String> = {
            let mut seen = HashSet::new();
            record
                .users
                .iter()
                .chain(self.directory.iter())
                .filter(|name| seen.insert(name.as_str()))
                .cloned()
                .collect()
        };
        self.directory = merged;

        tracing::debug!("Synced {} chats for {}", self.chats.len(), nickname);
        true
    }

    /// Chats in the configured order
    ///
    /// Ties keep their chat list order.
    pub fn sorted_chats(&self) -> Vec<&ChatEntry> {
        let mut sorted: Vec<&ChatEntry> = self.chats.iter().collect();
        match self.sort_order {
            SortOrder::Latest => sorted.sort_by(|a, b| b.last_activity().cmp(&a.last_activity())),
            SortOrder::Oldest => sorted.sort_by(|a, b| a.last_activity().cmp(&b.last_activity())),
        }
        sorted
    }

    /// Get a reference to a chat by conversation id
    pub fn chat(&self, id: &str) -> Option<&ChatEntry> {
        self.chats.iter().find(|c| c.id == id)
    }

    /// Get a mutable reference to a chat by conversation id
    pub fn chat_mut(&mut self, id: &str) -> Option<&mut ChatEntry> {
        self.chats.iter_mut().find(|c| c.id == id)
    }

    /// The chat currently open, if it is in the chat list
    pub fn active_chat(&self) -> Option<&ChatEntry> {
        self.active_chat_id.as_deref().and_then(|id| self.chat(id))
    }

    /// Partners of every chat in the list
    pub fn partners(&self) -> Vec<&str> {
        self.chats.iter().map(|c| c.partner.as_str()).collect()
    }

    /// Whether a chat with `nickname` already exists (case-insensitive)
    pub fn has_partner(&self, nickname: &str) -> bool {
        self.chats.iter().any(|c| same_nickname(&c.partner, nickname))
    }

    /// Record that conversation `id` was read at `at`
    ///
    /// Clears the entry's `has_new` flag and moves the marker.
    pub fn mark_read(&mut self, id: &str, at: DateTime<Utc>) {
        if let Some(chat) = self.chat_mut(id) {
            chat.mark_read();
        }
        self.chat_meta.insert(id.to_string(), ChatMeta::read_at(at));
    }

    /// Record that conversation `id` was viewed at `at`
    ///
    /// Marks it read only if it has unread messages or no marker yet, since
    /// otherwise moving the marker changes no `has_new` outcome. Returns
    /// whether it was marked.
    pub fn mark_viewed(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        let unread = self.chat(id).is_some_and(|c| c.has_new);
        if !unread && self.chat_meta.contains_key(id) {
            return false;
        }
        self.mark_read(id, at);
        true
    }

    /// Give conversation `id` an epoch read marker unless it has one
    pub fn seed_meta(&mut self, id: &str) {
        self.chat_meta.entry(id.to_string()).or_default();
    }

    /// Search the directory for chat candidates
    ///
    /// An empty directory is replaced by a freshly built one for this search.
    pub fn search(&self, keyword: &str, variants_per_name: usize) -> SearchOutcome {
        let fresh;
        let haystack = if self.directory.is_empty() {
            fresh = directory::build_directory(variants_per_name);
            &fresh
        } else {
            &self.directory
        };
        directory::search(haystack, keyword, self.nickname(), &self.partners())
    }

    /// Load the session record stored under `key`
    ///
    /// # Returns
    /// The stored session, or a logged-out state if the record is missing or
    /// malformed
    pub fn load(store: &StoreHandle, key: &str) -> Self {
        codec::load(store, key)
    }

    /// Save the session record under `key`
    ///
    /// Does nothing while logged out.
    pub fn persist(&self, store: &StoreHandle, key: &str) -> Result<()> {
        if !self.is_logged_in() {
            return Ok(());
        }
        codec::save(store, key, self)
    }

    /// Forget the user and everything derived for them
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
