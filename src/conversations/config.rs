//! Configuration for the conversation store.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};

/// Environment variable overriding [`StoreConfig::sqlite_path`].
pub const ENV_PATH: &str = "CHAT_STORE_PATH";
/// Environment variable overriding [`StoreConfig::pool_size`].
pub const ENV_POOL_SIZE: &str = "CHAT_STORE_POOL_SIZE";
/// Environment variable overriding [`StoreConfig::busy_timeout_ms`].
pub const ENV_BUSY_TIMEOUT_MS: &str = "CHAT_STORE_BUSY_TIMEOUT_MS";

/// `SQLite` journal mode applied when the store is initialized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log: readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal, `SQLite`'s own default.
    Delete,
}

impl JournalMode {
    /// Pragma value for this mode.
    #[must_use]
    pub const fn as_pragma(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// Storage settings for the conversation store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Maximum number of connections leased at once.
    pub pool_size: usize,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Journal mode set on initialization.
    pub journal_mode: JournalMode,
    /// Listing size used when a caller does not pick one.
    pub default_list_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("conversations.db"),
            pool_size: 4,
            busy_timeout_ms: 5_000,
            journal_mode: JournalMode::Wal,
            default_list_limit: 50,
        }
    }
}

impl StoreConfig {
    /// Default settings for the database at `sqlite_path`.
    #[must_use]
    pub fn new(sqlite_path: impl Into<PathBuf>) -> Self {
        Self {
            sqlite_path: sqlite_path.into(),
            ..Self::default()
        }
    }

    /// Default settings overlaid with `CHAT_STORE_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_PATH) {
            config.sqlite_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            config.pool_size = raw.trim().parse().map_err(|_| {
                StoreError::InvalidConfig(format!("{ENV_POOL_SIZE} is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = raw.trim().parse().map_err(|_| {
                StoreError::InvalidConfig(format!("{ENV_BUSY_TIMEOUT_MS} is not a number: {raw}"))
            })?;
        }
        Ok(config)
    }

    /// Set the connection pool size.
    #[must_use]
    pub const fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }

    /// Set the journal mode.
    #[must_use]
    pub const fn with_journal_mode(mut self, journal_mode: JournalMode) -> Self {
        self.journal_mode = journal_mode;
        self
    }

    /// Busy timeout as a [`Duration`].
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> StoreResult<()> {
        if self.sqlite_path.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig(
                "sqlite_path must not be empty".to_string(),
            ));
        }

        if self.pool_size == 0 {
            return Err(StoreError::InvalidConfig(
                "pool_size must be > 0".to_string(),
            ));
        }

        if self.default_list_limit == 0 {
            return Err(StoreError::InvalidConfig(
                "default_list_limit must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.sqlite_path, PathBuf::from("conversations.db"));
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.journal_mode, JournalMode::Wal);
        assert_eq!(config.default_list_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new("/tmp/chat.db")
            .with_pool_size(8)
            .with_busy_timeout_ms(250)
            .with_journal_mode(JournalMode::Delete);

        assert_eq!(config.sqlite_path, PathBuf::from("/tmp/chat.db"));
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.journal_mode.as_pragma(), "DELETE");
    }

    #[test]
    fn test_zero_pool_is_rejected() {
        let config = StoreConfig::default().with_pool_size(0);
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_env_overlay() {
        let config = StoreConfig::from_lookup(|key| match key {
            ENV_PATH => Some("/data/chat.db".to_string()),
            ENV_POOL_SIZE => Some(" 2 ".to_string()),
            _ => None,
        });
        let config = config.unwrap_or_default();
        assert_eq!(config.sqlite_path, PathBuf::from("/data/chat.db"));
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_env_overlay_rejects_garbage() {
        let config = StoreConfig::from_lookup(|key| {
            (key == ENV_BUSY_TIMEOUT_MS).then(|| "soon".to_string())
        });
        assert!(matches!(config, Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Result<StoreConfig, _> =
            serde_json::from_str(r#"{"sqlite_path": "x.db", "journal_mode": "delete"}"#);
        assert!(matches!(
            config,
            Ok(c) if c.journal_mode == JournalMode::Delete && c.pool_size == 4
        ));
    }
}
