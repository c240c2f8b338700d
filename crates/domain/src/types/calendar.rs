//! Calendar events and slot primitives

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::BooklineError;

/// Half-open `[start, end)` interval of absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Intersection test. Exact abutment (`self.end == other.start`) is not
    /// an overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Display/booking classification of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Available,
    Booked,
    Unavailable,
    Selected,
}

impl EventKind {
    /// Fixed display precedence: booked > unavailable > selected > available.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Booked => 3,
            Self::Unavailable => 2,
            Self::Selected => 1,
            Self::Available => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Unavailable => "unavailable",
            Self::Selected => "selected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = BooklineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "booked" => Ok(Self::Booked),
            "unavailable" => Ok(Self::Unavailable),
            "selected" => Ok(Self::Selected),
            other => Err(BooklineError::Persistence(format!("unknown event kind: {other}"))),
        }
    }
}

/// External calendar event, read-only input to the scheduling core.
///
/// Events backing a booked occurrence share the occurrence's id, which is
/// what lets a drag-reschedule exclude the slot being moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: EventKind,
}

impl CalendarEvent {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot { start: self.start, end: self.end }
    }
}

/// Reason a candidate slot cannot be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    PastSlot,
    Overlap,
    Blocked,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PastSlot => "slot is in the past",
            Self::Overlap => "slot overlaps a booked event",
            Self::Blocked => "slot falls on an unavailable period",
        };
        f.write_str(text)
    }
}

/// Absolute `[start, end)` query range for loading events or occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl InstantRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `slot` intersects this range.
    pub fn intersects(&self, slot: &TimeSlot) -> bool {
        self.start < slot.end && slot.start < self.end
    }
}
