//! Error types used throughout the scheduler

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ConflictKind;

/// Main error type for Bookline
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum BooklineError {
    #[error("Invalid pattern definition: {0}")]
    InvalidPatternDefinition(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Occurrence limit reached: {0}")]
    LimitReached(String),

    #[error("Slot conflict: {0}")]
    ConflictDetected(ConflictKind),

    #[error("No bookable slots in batch: {0} candidates skipped")]
    NoSlotsAvailable(u32),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for Bookline operations
pub type Result<T> = std::result::Result<T, BooklineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_serialize_with_type_tag() {
        let err = BooklineError::LimitReached("6 of 6 used".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""type":"LimitReached""#));

        let back: BooklineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn conflict_error_carries_kind() {
        let err = BooklineError::ConflictDetected(ConflictKind::Overlap);
        assert!(err.to_string().contains("booked"));
    }
}
