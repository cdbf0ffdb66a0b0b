//! Render-ready view models
//!
//! Plain data a front end draws: chat list rows and the open conversation.

use crate::session::{ChatEntry, SessionState};
use chrono::{DateTime, Local, Utc};

/// Preview shown for a chat without messages
pub const EMPTY_PREVIEW: &str = "Leave a message.";

/// One row of the chat list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatListRow {
    /// Conversation id
    pub id: String,
    /// Partner nickname
    pub partner: String,
    /// Time of last activity, formatted
    pub timestamp: String,
    /// Truncated last message, or the empty-chat placeholder
    pub preview: String,
    /// Unread badge
    pub has_new: bool,
}

/// One message bubble of the open conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    /// Message text
    pub content: String,
    /// Formatted send time
    pub time: String,
    /// Written by the logged-in user
    pub mine: bool,
}

/// The open conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    /// Conversation id
    pub id: String,
    /// Partner nickname
    pub partner: String,
    /// Messages in append order
    pub messages: Vec<MessageRow>,
}

/// Format a timestamp as local `YYYY-MM-DD HH:MM:SS`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

impl ChatListRow {
    /// Build the row for `chat`
    pub fn from_chat(chat: &ChatEntry, preview_max_chars: usize) -> Self {
        let (timestamp, preview) = match chat.last_message() {
            Some(last) => (
                format_timestamp(&last.timestamp),
                truncate_content(&last.content, preview_max_chars),
            ),
            None => (format_timestamp(&chat.created_at), EMPTY_PREVIEW.to_string()),
        };

        Self {
            id: chat.id.clone(),
            partner: chat.partner.clone(),
            timestamp,
            preview,
            has_new: chat.has_new,
        }
    }
}

impl ConversationView {
    /// Build the view of `chat` for the user `nickname`
    pub fn from_chat(chat: &ChatEntry, nickname: &str) -> Self {
        Self {
            id: chat.id.clone(),
            partner: chat.partner.clone(),
            messages: chat
                .messages
                .iter()
                .map(|m| MessageRow {
                    content: m.content.clone(),
                    time: format_timestamp(&m.timestamp),
                    mine: m.sender == nickname,
                })
                .collect(),
        }
    }
}

/// Chat list rows of `state` in its configured order
pub fn render_chat_list(state: &SessionState, preview_max_chars: usize) -> Vec<ChatListRow> {
    state
        .sorted_chats()
        .into_iter()
        .map(|chat| ChatListRow::from_chat(chat, preview_max_chars))
        .collect()
}
