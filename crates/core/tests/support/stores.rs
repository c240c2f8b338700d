//! In-memory mock for the `SchedulerRepository` port.
//!
//! Mirrors the idempotency contract of the real adapter - saves are keyed on
//! `(pattern_id, start)` - and surfaces scheduled occurrences as booked
//! calendar events, the way the storage collaborator does in production.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bookline_core::SchedulerRepository;
use bookline_domain::{
    BooklineError, CalendarEvent, EventKind, InstantRange, Occurrence, OccurrenceStatus,
    PatternCounters, PatternStatus, RecurrencePattern, Result,
};

/// In-memory `SchedulerRepository` for deterministic tests.
#[derive(Default, Clone)]
pub struct InMemorySchedulerRepository {
    patterns: Arc<Mutex<HashMap<Uuid, RecurrencePattern>>>,
    occurrences: Arc<Mutex<Vec<Occurrence>>>,
    events: Arc<Mutex<Vec<CalendarEvent>>>,
}

impl InMemorySchedulerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one external calendar event and return its id.
    pub fn seed_event(
        &self,
        resource_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        kind: EventKind,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.events.lock().unwrap().push(CalendarEvent { id, resource_id, start, end, kind });
        id
    }

    /// Snapshot of a pattern's occurrence log, ordered by start.
    pub fn occurrence_log(&self, pattern_id: Uuid) -> Vec<Occurrence> {
        let mut rows: Vec<Occurrence> = self
            .occurrences
            .lock()
            .unwrap()
            .iter()
            .filter(|occ| occ.pattern_id == pattern_id)
            .cloned()
            .collect();
        rows.sort_by_key(|occ| occ.start);
        rows
    }
}

#[async_trait]
impl SchedulerRepository for InMemorySchedulerRepository {
    async fn create_pattern(&self, pattern: &RecurrencePattern) -> Result<()> {
        let mut patterns = self.patterns.lock().unwrap();
        if patterns.contains_key(&pattern.id) {
            return Err(BooklineError::Persistence(format!(
                "pattern {} already exists",
                pattern.id
            )));
        }
        patterns.insert(pattern.id, pattern.clone());
        Ok(())
    }

    async fn load_pattern(&self, pattern_id: Uuid) -> Result<RecurrencePattern> {
        self.patterns
            .lock()
            .unwrap()
            .get(&pattern_id)
            .cloned()
            .ok_or_else(|| BooklineError::NotFound(format!("pattern {pattern_id}")))
    }

    async fn update_pattern(&self, pattern: &RecurrencePattern) -> Result<()> {
        let mut patterns = self.patterns.lock().unwrap();
        match patterns.get_mut(&pattern.id) {
            Some(slot) => {
                *slot = pattern.clone();
                Ok(())
            }
            None => Err(BooklineError::NotFound(format!("pattern {}", pattern.id))),
        }
    }

    async fn update_pattern_status(
        &self,
        pattern_id: Uuid,
        status: PatternStatus,
        counters: PatternCounters,
    ) -> Result<()> {
        let mut patterns = self.patterns.lock().unwrap();
        match patterns.get_mut(&pattern_id) {
            Some(pattern) => {
                pattern.status = status;
                pattern.created_occurrences = counters.created;
                pattern.skipped_occurrences = counters.skipped;
                Ok(())
            }
            None => Err(BooklineError::NotFound(format!("pattern {pattern_id}"))),
        }
    }

    async fn load_occurrences(
        &self,
        pattern_id: Uuid,
        range: Option<InstantRange>,
    ) -> Result<Vec<Occurrence>> {
        let mut rows: Vec<Occurrence> = self
            .occurrences
            .lock()
            .unwrap()
            .iter()
            .filter(|occ| occ.pattern_id == pattern_id)
            .filter(|occ| range.map_or(true, |r| r.intersects(&occ.slot())))
            .cloned()
            .collect();
        rows.sort_by_key(|occ| occ.start);
        Ok(rows)
    }

    async fn save_occurrences(
        &self,
        pattern_id: Uuid,
        occurrences: &[Occurrence],
    ) -> Result<usize> {
        let mut rows = self.occurrences.lock().unwrap();
        let mut inserted = 0;
        for occurrence in occurrences {
            let exists = rows
                .iter()
                .any(|row| row.pattern_id == pattern_id && row.start == occurrence.start);
            if !exists {
                rows.push(occurrence.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn update_occurrence(&self, occurrence: &Occurrence) -> Result<()> {
        let mut rows = self.occurrences.lock().unwrap();
        match rows.iter_mut().find(|row| row.id == occurrence.id) {
            Some(row) => {
                *row = occurrence.clone();
                Ok(())
            }
            None => Err(BooklineError::NotFound(format!("occurrence {}", occurrence.id))),
        }
    }

    async fn load_calendar_events(
        &self,
        resource_id: Uuid,
        range: InstantRange,
    ) -> Result<Vec<CalendarEvent>> {
        let patterns = self.patterns.lock().unwrap();
        let mut events: Vec<CalendarEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.resource_id == resource_id && range.intersects(&event.slot()))
            .cloned()
            .collect();

        // Scheduled occurrences surface as booked events carrying the
        // occurrence id, like the production storage collaborator.
        let occurrences = self.occurrences.lock().unwrap();
        for occurrence in occurrences.iter() {
            let same_resource = patterns
                .get(&occurrence.pattern_id)
                .is_some_and(|pattern| pattern.resource_id == resource_id);
            if same_resource
                && occurrence.status == OccurrenceStatus::Scheduled
                && range.intersects(&occurrence.slot())
            {
                events.push(CalendarEvent {
                    id: occurrence.id,
                    resource_id,
                    start: occurrence.start,
                    end: occurrence.end,
                    kind: EventKind::Booked,
                });
            }
        }

        Ok(events)
    }
}
