//! Conversation and message storage.
//!
//! This module is organized into:
//! - `config`: Store settings and environment overrides
//! - `errors`: Error taxonomy for store operations
//! - `types`: Conversation, summary, and message records
//! - `codec`: Metadata and timestamp column encoding
//! - `ids`: Conversation id generation
//! - `pool`: Bounded `tokio-rusqlite` connection pool
//! - `store`: The `ConversationStore` trait and its `SQLite` implementation

pub mod codec;
pub mod config;
pub mod errors;
pub mod ids;
pub mod pool;
pub mod store;
pub mod types;

pub use config::{JournalMode, StoreConfig};
pub use errors::{StoreError, StoreResult};
pub use ids::new_conversation_id;
pub use pool::{ConnectionPool, PooledConnection};
pub use store::{ConversationStore, SqliteConversationStore, StoreFuture};
pub use types::{Conversation, ConversationSummary, DEFAULT_TITLE, Message, Metadata};
