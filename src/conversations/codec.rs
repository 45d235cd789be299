//! Encoding of metadata documents and timestamps for `SQLite` columns.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

use super::errors::{StoreError, StoreResult};
use super::types::Metadata;

/// Current time at the precision the store persists (milliseconds).
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Encode a timestamp as epoch milliseconds.
#[must_use]
pub fn encode_timestamp(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Decode epoch milliseconds read back from `owner`'s row.
///
/// # Errors
/// Returns `DataIntegrity` if the value is out of range.
pub fn decode_timestamp(millis: i64, owner: &str) -> StoreResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        StoreError::DataIntegrity(format!("invalid timestamp {millis} on {owner}"))
    })
}

/// Serialize a metadata document to its column text.
///
/// # Errors
/// Returns `DataIntegrity` if the document cannot be serialized.
pub fn encode_metadata(metadata: &Metadata) -> StoreResult<String> {
    serde_json::to_string(metadata)
        .map_err(|err| StoreError::DataIntegrity(format!("cannot encode metadata: {err}")))
}

/// Deserialize metadata column text read back from `owner`'s row.
///
/// `NULL` or empty text is the empty document.
///
/// # Errors
/// Returns `DataIntegrity` if the text is not a JSON object.
pub fn decode_metadata(raw: Option<&str>, owner: &str) -> StoreResult<Metadata> {
    match raw {
        None => Ok(Metadata::new()),
        Some(text) if text.trim().is_empty() => Ok(Metadata::new()),
        Some(text) => serde_json::from_str(text).map_err(|err| {
            StoreError::DataIntegrity(format!("corrupt metadata on {owner}: {err}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_metadata_is_empty() {
        assert!(matches!(decode_metadata(None, "c1"), Ok(m) if m.is_empty()));
        assert!(matches!(decode_metadata(Some(""), "c1"), Ok(m) if m.is_empty()));
    }

    #[test]
    fn test_corrupt_metadata_is_integrity_fault() {
        let err = decode_metadata(Some("{not json"), "c1");
        assert!(matches!(err, Err(StoreError::DataIntegrity(_))));

        let not_object = decode_metadata(Some("[1, 2]"), "c1");
        assert!(matches!(not_object, Err(StoreError::DataIntegrity(_))));
    }

    #[test]
    fn test_now_survives_millisecond_storage() {
        let ts = now();
        let decoded = decode_timestamp(encode_timestamp(ts), "c1");
        assert!(matches!(decoded, Ok(back) if back == ts));
    }
}
