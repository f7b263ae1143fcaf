//! Test utilities for Coachline
//!
//! Shared fixtures for unit tests: conversation ids, backend records and
//! fixed timestamps, plus an assertion helper for error messages.

use chrono::{DateTime, TimeZone, Utc};

use crate::conversation::{ConversationIds, ConversationRecord, Message};

/// Ids for `conversation_id` under a fixed athlete and coach
pub fn test_ids(conversation_id: &str) -> ConversationIds {
    ConversationIds::new("athlete", "coach", conversation_id)
}

/// Backend record for `conversation_id` holding `messages`
pub fn record_with(conversation_id: &str, messages: Vec<Message>) -> ConversationRecord {
    let mut record = ConversationRecord::empty(conversation_id);
    record.messages = messages;
    record
}

/// UTC timestamp `secs` seconds after the epoch
///
/// # Panics
///
/// Panics if `secs` is out of range
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .expect("timestamp in range")
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the error message doesn't contain the expected text
pub fn assert_error_contains<T: std::fmt::Debug>(result: crate::error::Result<T>, expected: &str) {
    match result {
        Ok(value) => panic!("Expected error containing '{}', got Ok({:?})", expected, value),
        Err(e) => {
            let message = format!("{:#}", e);
            assert!(
                message.contains(expected),
                "Expected error containing '{}', got '{}'",
                expected,
                message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_with_sets_messages() {
        let record = record_with("conv1", vec![Message::user("hi")]);
        assert_eq!(record.conversation_id, "conv1");
        assert_eq!(record.messages.len(), 1);
    }

    #[test]
    fn test_assert_error_contains() {
        let result: crate::error::Result<()> =
            Err(crate::error::CoachlineError::Transport("boom".to_string()).into());
        assert_error_contains(result, "boom");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_panics_on_ok() {
        assert_error_contains(Ok(1), "anything");
    }
}
