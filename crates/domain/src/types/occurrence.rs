//! Materialized occurrence slots

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::BooklineError;
use crate::types::calendar::TimeSlot;

/// Status of a single materialized slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceStatus {
    Scheduled,
    Completed,
    Cancelled,
    /// Generated but rejected by a conflict; kept for audit.
    Skipped,
}

impl OccurrenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OccurrenceStatus {
    type Err = BooklineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "skipped" => Ok(Self::Skipped),
            other => {
                Err(BooklineError::Persistence(format!("unknown occurrence status: {other}")))
            }
        }
    }
}

/// One concrete, bookable time slot derived from a pattern.
///
/// Instants are absolute; the local wall-clock view lives on the pattern.
/// Rows are append-only once persisted: generation never rewrites an
/// existing occurrence, and mutation is limited to `status` plus, for a
/// drag-reschedule, the instants and the `manual_override` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: Uuid,
    pub pattern_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: OccurrenceStatus,
    /// Set when the slot was moved by direct user action; such occurrences
    /// are exempt from regeneration.
    pub manual_override: bool,
}

impl Occurrence {
    pub fn scheduled(pattern_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern_id,
            start,
            end,
            status: OccurrenceStatus::Scheduled,
            manual_override: false,
        }
    }

    pub fn skipped(pattern_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { status: OccurrenceStatus::Skipped, ..Self::scheduled(pattern_id, start, end) }
    }

    /// Whether this occurrence consumes a slot of the pattern's limit.
    pub fn is_live(&self) -> bool {
        matches!(self.status, OccurrenceStatus::Scheduled | OccurrenceStatus::Completed)
    }

    pub fn slot(&self) -> TimeSlot {
        TimeSlot { start: self.start, end: self.end }
    }
}
