//! Port interfaces for the scheduling core.
//!
//! These traits define the boundaries between the scheduling logic and the
//! storage/clock collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bookline_domain::{
    CalendarEvent, InstantRange, Occurrence, PatternCounters, PatternStatus, RecurrencePattern,
    Result,
};

/// Trait for persisting patterns and their occurrence log.
///
/// `save_occurrences` must be idempotent on `(pattern_id, start)`: re-running
/// a generation step after a failed persist must not create duplicates.
#[async_trait]
pub trait SchedulerRepository: Send + Sync {
    async fn create_pattern(&self, pattern: &RecurrencePattern) -> Result<()>;

    async fn load_pattern(&self, pattern_id: Uuid) -> Result<RecurrencePattern>;

    /// Persist field-level changes (anchor shift, bounds) made by a
    /// reschedule.
    async fn update_pattern(&self, pattern: &RecurrencePattern) -> Result<()>;

    /// Persist a status transition together with the generation counters.
    async fn update_pattern_status(
        &self,
        pattern_id: Uuid,
        status: PatternStatus,
        counters: PatternCounters,
    ) -> Result<()>;

    /// Occurrences for a pattern, ordered by start instant.
    async fn load_occurrences(
        &self,
        pattern_id: Uuid,
        range: Option<InstantRange>,
    ) -> Result<Vec<Occurrence>>;

    /// Append occurrences, keyed on `(pattern_id, start)`. Returns how many
    /// rows were actually inserted; rows already present are left untouched.
    async fn save_occurrences(&self, pattern_id: Uuid, occurrences: &[Occurrence])
        -> Result<usize>;

    /// Mutate one occurrence by id: status, instants, override flag.
    async fn update_occurrence(&self, occurrence: &Occurrence) -> Result<()>;

    /// Calendar events for a resource intersecting `range`. Booked
    /// occurrences surface here as events sharing the occurrence id.
    async fn load_calendar_events(
        &self,
        resource_id: Uuid,
        range: InstantRange,
    ) -> Result<Vec<CalendarEvent>>;
}

/// Time source abstraction so lifecycle decisions stay deterministic in
/// tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
