//! SQLite-backed conversation and message store.

use std::future::Future;
use std::pin::Pin;

use rusqlite::{OptionalExtension, TransactionBehavior};
use tracing::{debug, info, warn};

use super::codec::{decode_metadata, decode_timestamp, encode_metadata, encode_timestamp, now};
use super::config::StoreConfig;
use super::errors::{StoreError, StoreResult};
use super::pool::ConnectionPool;
use super::types::{Conversation, ConversationSummary, DEFAULT_TITLE, Message, Metadata};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence façade for conversations and their messages.
///
/// Every operation is one atomic unit of work against the backing engine.
/// Absence is reported as `None` or `false`, never as an error.
pub trait ConversationStore: Send + Sync {
    /// Create the tables and index if they do not exist.
    ///
    /// # Errors
    /// Returns an error if the storage engine fails.
    fn initialize(&self) -> StoreFuture<'_, StoreResult<()>>;

    /// Insert a new conversation with `created_at = updated_at = now`.
    ///
    /// # Errors
    /// Returns `DuplicateKey` if `id` is already in use.
    fn create_conversation(
        &self,
        id: &str,
        title: Option<&str>,
        metadata: Option<Metadata>,
    ) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Get a conversation by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the row cannot be decoded.
    fn get_conversation(&self, id: &str) -> StoreFuture<'_, StoreResult<Option<Conversation>>>;

    /// List conversations, most recently updated first, with message counts.
    ///
    /// # Errors
    /// Returns an error if storage access fails or a row cannot be decoded.
    fn list_conversations(
        &self,
        limit: usize,
    ) -> StoreFuture<'_, StoreResult<Vec<ConversationSummary>>>;

    /// Append a message and bump the conversation's `updated_at`.
    ///
    /// # Errors
    /// Returns `UnknownConversation` if the parent does not exist.
    fn add_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> StoreFuture<'_, StoreResult<Message>>;

    /// All messages of a conversation in append order.
    ///
    /// # Errors
    /// Returns an error if storage access fails or a row cannot be decoded.
    fn get_messages(&self, conversation_id: &str) -> StoreFuture<'_, StoreResult<Vec<Message>>>;

    /// Delete a conversation and all of its messages.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete_conversation(&self, id: &str) -> StoreFuture<'_, StoreResult<bool>>;

    /// Set the title and bump `updated_at`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn update_conversation_title(&self, id: &str, title: &str)
    -> StoreFuture<'_, StoreResult<bool>>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        metadata TEXT
    );
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id TEXT NOT NULL
            REFERENCES conversations (id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        metadata TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation_id
        ON messages (conversation_id);";

/// Raw conversation columns: id, title, created_at, updated_at, metadata.
type ConversationRow = (String, String, i64, i64, Option<String>);

/// Raw message columns: id, conversation_id, role, content, timestamp, metadata.
type MessageRow = (i64, String, String, String, i64, Option<String>);

fn read_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_conversation(row: ConversationRow) -> StoreResult<Conversation> {
    let (id, title, created_at, updated_at, metadata) = row;
    Ok(Conversation {
        created_at: decode_timestamp(created_at, &id)?,
        updated_at: decode_timestamp(updated_at, &id)?,
        metadata: decode_metadata(metadata.as_deref(), &id)?,
        title,
        id,
    })
}

fn decode_message(row: MessageRow) -> StoreResult<Message> {
    let (id, conversation_id, role, content, timestamp, metadata) = row;
    let owner = format!("message {id}");
    Ok(Message {
        id,
        timestamp: decode_timestamp(timestamp, &owner)?,
        metadata: decode_metadata(metadata.as_deref(), &owner)?,
        conversation_id,
        role,
        content,
    })
}

/// Log and classify an engine failure for `subject`.
fn engine_failure(op: &str, subject: &str, err: tokio_rusqlite::Error) -> StoreError {
    let err = StoreError::from_engine(err, subject);
    warn!("{op} failed for {subject}: {err}");
    err
}

/// `SQLite` implementation of [`ConversationStore`].
pub struct SqliteConversationStore {
    pool: ConnectionPool,
    config: StoreConfig,
}

impl SqliteConversationStore {
    /// Validate `config`, build the connection pool and initialize the schema.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the database cannot
    /// be opened or initialized.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let store = Self {
            pool: ConnectionPool::new(&config),
            config,
        };
        store.initialize().await?;
        info!(
            "Conversation store ready at {} (pool size {})",
            store.config.sqlite_path.display(),
            store.config.pool_size
        );
        Ok(store)
    }

    /// Configuration the store was opened with.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// List conversations using the configured default limit.
    ///
    /// # Errors
    /// Returns an error if storage access fails or a row cannot be decoded.
    pub async fn list_recent(&self) -> StoreResult<Vec<ConversationSummary>> {
        self.list_conversations(self.config.default_list_limit)
            .await
    }
}

impl ConversationStore for SqliteConversationStore {
    fn initialize(&self) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let path = self.config.sqlite_path.display().to_string();
            let journal_mode = self.config.journal_mode.as_pragma();
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| engine_failure("initialize", &path, err))?;
            let applied = conn
                .call(move |conn| {
                    let applied: String = conn.pragma_update_and_check(
                        None,
                        "journal_mode",
                        journal_mode,
                        |row| row.get(0),
                    )?;
                    let tx = conn.transaction()?;
                    tx.execute_batch(SCHEMA)?;
                    tx.commit()?;
                    Ok(applied)
                })
                .await
                .map_err(|err| engine_failure("initialize", &path, err))?;
            info!("Initialized schema at {path} (journal_mode={applied})");
            Ok(())
        })
    }

    fn create_conversation(
        &self,
        id: &str,
        title: Option<&str>,
        metadata: Option<Metadata>,
    ) -> StoreFuture<'_, StoreResult<Conversation>> {
        let id = id.to_string();
        let title = title.unwrap_or(DEFAULT_TITLE).to_string();
        Box::pin(async move {
            let metadata = metadata.unwrap_or_default();
            let encoded = encode_metadata(&metadata)?;
            let created_at = now();
            let conversation = Conversation {
                id: id.clone(),
                title: title.clone(),
                created_at,
                updated_at: created_at,
                metadata,
            };

            let id_param = id.clone();
            let millis = encode_timestamp(created_at);
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| engine_failure("create_conversation", &id, err))?;
            conn.call(move |conn| {
                conn.execute(
                    "INSERT INTO conversations (id, title, created_at, updated_at, metadata)
                     VALUES (?1, ?2, ?3, ?3, ?4)",
                    rusqlite::params![id_param, title, millis, encoded],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| engine_failure("create_conversation", &id, err))?;

            debug!("Created conversation {id}");
            Ok(conversation)
        })
    }

    fn get_conversation(&self, id: &str) -> StoreFuture<'_, StoreResult<Option<Conversation>>> {
        let id = id.to_string();
        Box::pin(async move {
            let id_param = id.clone();
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| engine_failure("get_conversation", &id, err))?;
            let row = conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, title, created_at, updated_at, metadata
                             FROM conversations
                             WHERE id = ?1",
                            [&id_param],
                            read_conversation,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await
                .map_err(|err| engine_failure("get_conversation", &id, err))?;

            row.map(decode_conversation).transpose()
        })
    }

    fn list_conversations(
        &self,
        limit: usize,
    ) -> StoreFuture<'_, StoreResult<Vec<ConversationSummary>>> {
        Box::pin(async move {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| engine_failure("list_conversations", "conversation listing", err))?;
            let rows = conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT c.id, c.title, c.created_at, c.updated_at, c.metadata,
                                COUNT(m.id) AS message_count
                         FROM conversations c
                         LEFT JOIN messages m ON m.conversation_id = c.id
                         GROUP BY c.id
                         ORDER BY c.updated_at DESC, c.rowid DESC
                         LIMIT ?1",
                    )?;
                    let rows = stmt
                        .query_map([limit], |row| {
                            Ok((read_conversation(row)?, row.get::<_, i64>(5)?))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await
                .map_err(|err| engine_failure("list_conversations", "conversation listing", err))?;

            let mut summaries = Vec::with_capacity(rows.len());
            for (row, count) in rows {
                let conversation = decode_conversation(row)?;
                let message_count = u64::try_from(count).map_err(|_| {
                    StoreError::DataIntegrity(format!(
                        "invalid message count {count} on {}",
                        conversation.id
                    ))
                })?;
                summaries.push(ConversationSummary {
                    conversation,
                    message_count,
                });
            }
            Ok(summaries)
        })
    }

    fn add_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> StoreFuture<'_, StoreResult<Message>> {
        let conversation_id = conversation_id.to_string();
        let role = role.to_string();
        let content = content.to_string();
        Box::pin(async move {
            let metadata = metadata.unwrap_or_default();
            let encoded = encode_metadata(&metadata)?;

            let (parent, role_param, content_param) =
                (conversation_id.clone(), role.clone(), content.clone());
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| engine_failure("add_message", &conversation_id, err))?;
            let (id, millis) = conn
                .call(move |conn| {
                    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                    // Stamped under the write lock; never earlier than the conversation's last message.
                    let latest: Option<i64> = tx.query_row(
                        "SELECT MAX(timestamp) FROM messages WHERE conversation_id = ?1",
                        [&parent],
                        |row| row.get(0),
                    )?;
                    let stamped = encode_timestamp(now());
                    let millis = latest.map_or(stamped, |last| stamped.max(last));
                    tx.execute(
                        "INSERT INTO messages (conversation_id, role, content, timestamp, metadata)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![parent, role_param, content_param, millis, encoded],
                    )?;
                    let id = tx.last_insert_rowid();
                    tx.execute(
                        "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                        rusqlite::params![millis, parent],
                    )?;
                    tx.commit()?;
                    Ok((id, millis))
                })
                .await
                .map_err(|err| engine_failure("add_message", &conversation_id, err))?;
            let timestamp = decode_timestamp(millis, &format!("message {id}"))?;

            debug!("Added message {id} to conversation {conversation_id}");
            Ok(Message {
                id,
                conversation_id,
                role,
                content,
                timestamp,
                metadata,
            })
        })
    }

    fn get_messages(&self, conversation_id: &str) -> StoreFuture<'_, StoreResult<Vec<Message>>> {
        let conversation_id = conversation_id.to_string();
        Box::pin(async move {
            let parent = conversation_id.clone();
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| engine_failure("get_messages", &conversation_id, err))?;
            let rows = conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, role, content, timestamp, metadata
                         FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY timestamp ASC, id ASC",
                    )?;
                    let rows = stmt
                        .query_map([&parent], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                                row.get(5)?,
                            ))
                        })?
                        .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await
                .map_err(|err| engine_failure("get_messages", &conversation_id, err))?;

            rows.into_iter()
                .map(decode_message)
                .collect::<StoreResult<Vec<_>>>()
        })
    }

    fn delete_conversation(&self, id: &str) -> StoreFuture<'_, StoreResult<bool>> {
        let id = id.to_string();
        Box::pin(async move {
            let id_param = id.clone();
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| engine_failure("delete_conversation", &id, err))?;
            let removed = conn
                .call(move |conn| {
                    let removed =
                        conn.execute("DELETE FROM conversations WHERE id = ?1", [&id_param])?;
                    Ok(removed > 0)
                })
                .await
                .map_err(|err| engine_failure("delete_conversation", &id, err))?;

            debug!("Delete conversation {id}: removed={removed}");
            Ok(removed)
        })
    }

    fn update_conversation_title(
        &self,
        id: &str,
        title: &str,
    ) -> StoreFuture<'_, StoreResult<bool>> {
        let id = id.to_string();
        let title = title.to_string();
        Box::pin(async move {
            let id_param = id.clone();
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| engine_failure("update_conversation_title", &id, err))?;
            let updated = conn
                .call(move |conn| {
                    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                    let millis = encode_timestamp(now());
                    let updated = tx.execute(
                        "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
                        rusqlite::params![title, millis, id_param],
                    )?;
                    tx.commit()?;
                    Ok(updated > 0)
                })
                .await
                .map_err(|err| engine_failure("update_conversation_title", &id, err))?;

            debug!("Renamed conversation {id}: updated={updated}");
            Ok(updated)
        })
    }
}
