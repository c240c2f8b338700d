//! Interactive calendar actions
//!
//! Bridges the generator, resolver, and lifecycle state to slot clicks and
//! drag-reschedules. The protocol is two-phase - propose, then commit - so
//! the scheduling core stays decoupled from any particular UI toolkit and
//! the reject/commit boundary is testable without one.

mod service;

pub use service::{EventDrop, InteractionService, SlotSelection};

use chrono::{DateTime, Utc};

use bookline_domain::{CalendarEvent, EventKind};

/// Display classification of a single instant.
///
/// Precedence is fixed: `booked > unavailable > selected > available`. This
/// resolves the case where a just-selected slot was booked by another actor
/// before commit.
pub fn classify_instant(events: &[CalendarEvent], at: DateTime<Utc>) -> EventKind {
    events
        .iter()
        .filter(|event| event.slot().contains(at))
        .map(|event| event.kind)
        .max_by_key(|kind| kind.precedence())
        .unwrap_or(EventKind::Available)
}
