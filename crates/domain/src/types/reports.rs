//! Operation reports returned by series-level operations
//!
//! Series operations report how many occurrences they touched so callers can
//! surface counts next to any error.

use serde::{Deserialize, Serialize};

use crate::types::occurrence::Occurrence;

/// Result of one generation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    /// Occurrences accepted and persisted as scheduled.
    pub created: u32,
    /// Candidates rejected by a conflict and persisted as skipped.
    pub skipped: u32,
    /// Whether the series ran out of candidate dates and was completed.
    pub completed: bool,
    /// The accepted occurrences, in start order.
    pub occurrences: Vec<Occurrence>,
}

/// Result of a `cancel_future` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub cancelled: u32,
    pub retained: u32,
}

/// Result of a reschedule: the cancellation sweep plus the regenerated batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleOutcome {
    pub cancelled: u32,
    pub generation: GenerationOutcome,
}
