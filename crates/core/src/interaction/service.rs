//! Interactive slot selection and drag-reschedule

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use bookline_domain::{
    BooklineError, ConflictKind, InstantRange, Occurrence, OccurrenceStatus, Result, TimeSlot,
};

use crate::conflict::{check_slot, SlotVerdict};
use crate::scheduling::ports::{Clock, SchedulerRepository};
use crate::scheduling::PatternLocks;

/// Payload handed to the UI collaborator when a free slot is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSelection {
    pub resource_id: Uuid,
    pub slot: TimeSlot,
}

/// Payload handed to the UI collaborator after a committed drag-reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDrop {
    pub occurrence: Occurrence,
    /// Where the occurrence sat before the move, for undo affordances.
    pub previous: TimeSlot,
}

/// Adapter between pointer-driven calendar actions and the scheduling core.
pub struct InteractionService {
    repository: Arc<dyn SchedulerRepository>,
    clock: Arc<dyn Clock>,
    locks: Arc<PatternLocks>,
}

impl InteractionService {
    /// Create a new interaction service
    pub fn new(repository: Arc<dyn SchedulerRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock, locks: Arc::new(PatternLocks::new()) }
    }

    /// Share the series service's lock registry so occurrence commits stay
    /// serialized with batch operations on the same pattern.
    pub fn with_locks(mut self, locks: Arc<PatternLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Propose selecting the pointer-derived slot.
    ///
    /// The `Ok` value is the `on_select_slot` payload; a conflict comes back
    /// as `ConflictDetected` and nothing is emitted to the UI collaborator.
    pub async fn select_slot(&self, resource_id: Uuid, slot: TimeSlot) -> Result<SlotSelection> {
        if slot.end <= slot.start {
            return Err(BooklineError::InvalidPatternDefinition(
                "slot end must come after its start".to_string(),
            ));
        }

        let events = self
            .repository
            .load_calendar_events(resource_id, InstantRange::new(slot.start, slot.end))
            .await?;

        match check_slot(&slot, self.clock.now(), &events, None) {
            SlotVerdict::Clear => Ok(SlotSelection { resource_id, slot }),
            SlotVerdict::Conflict(kind) => {
                debug!(%resource_id, conflict = %kind, "slot selection rejected");
                Err(BooklineError::ConflictDetected(kind))
            }
        }
    }

    /// Re-validate and commit a drag of an existing occurrence.
    ///
    /// The dragged occurrence is excluded from the conflict check so it does
    /// not collide with itself. On success the new instants are persisted
    /// with `manual_override` set; on conflict the caller reverts the visual
    /// move and nothing is committed.
    pub async fn move_occurrence(
        &self,
        pattern_id: Uuid,
        occurrence_id: Uuid,
        new_start: DateTime<Utc>,
    ) -> Result<EventDrop> {
        let handle = self.locks.for_pattern(pattern_id);
        let _guard = handle.lock().await;

        let pattern = self.repository.load_pattern(pattern_id).await?;
        let occurrences = self.repository.load_occurrences(pattern_id, None).await?;
        let Some(mut occurrence) =
            occurrences.iter().find(|occ| occ.id == occurrence_id).cloned()
        else {
            return Err(BooklineError::NotFound(format!(
                "occurrence {occurrence_id} of pattern {pattern_id}"
            )));
        };

        if occurrence.status != OccurrenceStatus::Scheduled {
            return Err(BooklineError::InvalidStateTransition(format!(
                "only scheduled occurrences can be moved, this one is {}",
                occurrence.status
            )));
        }

        let target = TimeSlot::new(new_start, new_start + occurrence.slot().duration());
        let events = self
            .repository
            .load_calendar_events(pattern.resource_id, InstantRange::new(target.start, target.end))
            .await?;

        if let SlotVerdict::Conflict(kind) =
            check_slot(&target, self.clock.now(), &events, Some(occurrence_id))
        {
            debug!(%occurrence_id, conflict = %kind, "drag rejected, caller reverts");
            return Err(BooklineError::ConflictDetected(kind));
        }

        // Stay clear of the pattern's own siblings as well; they may not all
        // surface as booked events in the queried range.
        let sibling_overlap = occurrences.iter().any(|occ| {
            occ.id != occurrence_id && occ.is_live() && target.overlaps(&occ.slot())
        });
        if sibling_overlap {
            return Err(BooklineError::ConflictDetected(ConflictKind::Overlap));
        }

        let previous = occurrence.slot();
        occurrence.start = target.start;
        occurrence.end = target.end;
        occurrence.manual_override = true;
        self.repository.update_occurrence(&occurrence).await?;

        debug!(%occurrence_id, from = %previous.start, to = %target.start, "occurrence moved");
        Ok(EventDrop { occurrence, previous })
    }
}
