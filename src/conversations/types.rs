//! Record types returned by the conversation store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema-less document attached to conversations and messages.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Title given to conversations created without one.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// A persisted conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Caller-supplied unique identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Set once at insertion.
    pub created_at: DateTime<Utc>,
    /// Bumped on every message append and title update.
    pub updated_at: DateTime<Utc>,
    /// Caller-defined document.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A conversation row in a listing, with its message count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The conversation itself.
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Number of messages in the conversation.
    pub message_count: u64,
}

/// A persisted message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned, increasing across all conversations.
    pub id: i64,
    /// Owning conversation.
    pub conversation_id: String,
    /// Speaker tag, e.g. "human" or "ai". Not validated.
    pub role: String,
    /// Message body.
    pub content: String,
    /// Set once at insertion.
    pub timestamp: DateTime<Utc>,
    /// Caller-defined document.
    #[serde(default)]
    pub metadata: Metadata,
}
