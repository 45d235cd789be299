//! Error types for the conversation store.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Conversation store error type.
///
/// A missing conversation is never an error: lookups return `None` and
/// mutations return `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conversation with this id already exists.
    #[error("conversation {0} already exists")]
    DuplicateKey(String),
    /// A message referenced a conversation that does not exist.
    #[error("conversation {0} does not exist")]
    UnknownConversation(String),
    /// The storage engine could not complete the operation.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] tokio_rusqlite::Error),
    /// Stored data could not be decoded.
    #[error("data integrity fault: {0}")]
    DataIntegrity(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Classify an engine error raised while operating on `subject`.
    pub(crate) fn from_engine(err: tokio_rusqlite::Error, subject: &str) -> Self {
        let constraint = match &err {
            tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Some(failure.extended_code)
            }
            _ => None,
        };
        let undecodable = matches!(
            &err,
            tokio_rusqlite::Error::Rusqlite(
                rusqlite::Error::InvalidColumnType(..)
                    | rusqlite::Error::FromSqlConversionFailure(..)
                    | rusqlite::Error::IntegralValueOutOfRange(..)
            )
        );

        match constraint {
            Some(
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            ) => Self::DuplicateKey(subject.to_string()),
            Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                Self::UnknownConversation(subject.to_string())
            }
            _ if undecodable => Self::DataIntegrity(format!("{subject}: {err}")),
            _ => Self::StorageUnavailable(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint(extended_code: std::os::raw::c_int) -> tokio_rusqlite::Error {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(extended_code),
            None,
        ))
    }

    #[test]
    fn test_primary_key_violation_is_duplicate() {
        let err = StoreError::from_engine(
            constraint(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
            "abc",
        );
        assert!(matches!(err, StoreError::DuplicateKey(id) if id == "abc"));
    }

    #[test]
    fn test_foreign_key_violation_is_unknown_conversation() {
        let err = StoreError::from_engine(
            constraint(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
            "abc",
        );
        assert!(matches!(err, StoreError::UnknownConversation(id) if id == "abc"));
    }

    #[test]
    fn test_other_failures_are_storage_unavailable() {
        let err = StoreError::from_engine(tokio_rusqlite::Error::ConnectionClosed, "abc");
        assert!(matches!(err, StoreError::StorageUnavailable(_)));

        let busy = StoreError::from_engine(constraint(rusqlite::ffi::SQLITE_BUSY), "abc");
        assert!(matches!(busy, StoreError::StorageUnavailable(_)));
    }

    #[test]
    fn test_undecodable_column_names_the_subject() {
        let err = StoreError::from_engine(
            tokio_rusqlite::Error::Rusqlite(rusqlite::Error::InvalidColumnType(
                4,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            )),
            "message 7",
        );
        assert!(matches!(&err, StoreError::DataIntegrity(detail) if detail.starts_with("message 7: ")));
        assert!(!err.to_string().contains("conversation"));
    }
}
