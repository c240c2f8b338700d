//! Conflict detection for candidate slots.
//!
//! Pure verdicts over a slot and the current event set; callers decide what
//! to do with them. No I/O, no side effects.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use bookline_domain::{CalendarEvent, ConflictKind, EventKind, TimeSlot};

/// Outcome of checking one candidate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotVerdict {
    Clear,
    Conflict(ConflictKind),
}

impl SlotVerdict {
    pub fn is_clear(self) -> bool {
        matches!(self, Self::Clear)
    }
}

/// Check `slot` against the current time and the existing events.
///
/// Intervals are half-open: a slot that exactly abuts an event
/// (`slot.end == event.start`) does not conflict. Booked events take
/// precedence over unavailable ones when both intersect.
///
/// `exclude_occurrence_id` ignores the event backing the occurrence being
/// moved, so a drag-reschedule does not collide with itself.
pub fn check_slot(
    slot: &TimeSlot,
    now: DateTime<Utc>,
    events: &[CalendarEvent],
    exclude_occurrence_id: Option<Uuid>,
) -> SlotVerdict {
    if slot.start < now {
        return SlotVerdict::Conflict(ConflictKind::PastSlot);
    }

    let mut blocked = false;
    for event in events {
        if exclude_occurrence_id == Some(event.id) || !slot.overlaps(&event.slot()) {
            continue;
        }
        match event.kind {
            EventKind::Booked => return SlotVerdict::Conflict(ConflictKind::Overlap),
            EventKind::Unavailable => blocked = true,
            EventKind::Available | EventKind::Selected => {}
        }
    }

    if blocked {
        SlotVerdict::Conflict(ConflictKind::Blocked)
    } else {
        SlotVerdict::Clear
    }
}
