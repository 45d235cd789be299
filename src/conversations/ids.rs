//! Identifier helpers.
//!
//! The store treats conversation ids as opaque strings; these helpers only
//! cover the common case of a caller minting a fresh random id.

use uuid::Uuid;

/// Generate a fresh conversation id (random `UUIDv4`, hyphenated).
#[inline]
#[must_use]
pub fn new_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_uuids() {
        let a = new_conversation_id();
        let b = new_conversation_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
