//! Series lifecycle service - core business logic

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use bookline_domain::constants::{DEFAULT_INITIAL_BATCH, MAX_BATCH_SIZE, MAX_CANDIDATE_SCAN};
use bookline_domain::{
    BooklineError, CalendarEvent, CancelOutcome, ConflictKind, GenerationOutcome, InstantRange,
    Occurrence, OccurrenceStatus, PatternStatus, RecurrencePattern, RescheduleOutcome, Result,
    TimeSlot,
};

use crate::conflict::{check_slot, SlotVerdict};
use crate::recurrence::generate;

use super::locks::PatternLocks;
use super::ports::{Clock, SchedulerRepository};

/// Stateful orchestrator for recurrence series.
///
/// Owns the pattern status machine and drives the generator and the conflict
/// resolver against the storage collaborator. All mutating operations on one
/// pattern are serialized through a per-pattern lock; reads stay lock-free.
pub struct SeriesService {
    repository: Arc<dyn SchedulerRepository>,
    clock: Arc<dyn Clock>,
    locks: Arc<PatternLocks>,
    initial_batch: u32,
}

impl SeriesService {
    /// Create a new series service
    pub fn new(repository: Arc<dyn SchedulerRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            locks: Arc::new(PatternLocks::new()),
            initial_batch: DEFAULT_INITIAL_BATCH,
        }
    }

    /// Configure the batch size used on creation and reschedule.
    pub fn with_initial_batch(mut self, count: u32) -> Self {
        self.initial_batch = count;
        self
    }

    /// Share a lock registry with another service touching the same patterns.
    pub fn with_locks(mut self, locks: Arc<PatternLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// The per-pattern lock registry, for wiring into the interaction layer.
    pub fn locks(&self) -> Arc<PatternLocks> {
        Arc::clone(&self.locks)
    }

    /// Validate and persist a new pattern, then materialize its initial
    /// occurrence batch.
    pub async fn create_pattern(
        &self,
        pattern: RecurrencePattern,
    ) -> Result<(RecurrencePattern, GenerationOutcome)> {
        pattern.validate()?;

        let handle = self.locks.for_pattern(pattern.id);
        let _guard = handle.lock().await;

        self.repository.create_pattern(&pattern).await?;

        let mut pattern = pattern;
        let requested = match pattern.remaining_capacity() {
            Some(remaining) => self.initial_batch.min(remaining),
            None => self.initial_batch,
        };
        let outcome =
            self.run_generation(&mut pattern, Vec::new(), requested as usize, true).await?;

        info!(
            pattern_id = %pattern.id,
            created = outcome.created,
            skipped = outcome.skipped,
            "created recurrence pattern"
        );
        Ok((pattern, outcome))
    }

    /// `active -> paused`. Existing occurrences are untouched and no new
    /// ones are generated until the pattern resumes.
    pub async fn pause(&self, pattern_id: Uuid) -> Result<RecurrencePattern> {
        let handle = self.locks.for_pattern(pattern_id);
        let _guard = handle.lock().await;

        let mut pattern = self.repository.load_pattern(pattern_id).await?;
        if pattern.status != PatternStatus::Active {
            return Err(BooklineError::InvalidStateTransition(format!(
                "cannot pause a {} pattern",
                pattern.status
            )));
        }

        pattern.status = PatternStatus::Paused;
        self.repository
            .update_pattern_status(pattern_id, pattern.status, pattern.counters())
            .await?;
        Ok(pattern)
    }

    /// `paused -> active`. Generation picks up from the existing occurrence
    /// log on the next extension.
    pub async fn resume(&self, pattern_id: Uuid) -> Result<RecurrencePattern> {
        let handle = self.locks.for_pattern(pattern_id);
        let _guard = handle.lock().await;

        let mut pattern = self.repository.load_pattern(pattern_id).await?;
        if pattern.status != PatternStatus::Paused {
            return Err(BooklineError::InvalidStateTransition(format!(
                "cannot resume a {} pattern",
                pattern.status
            )));
        }

        pattern.status = PatternStatus::Active;
        self.repository
            .update_pattern_status(pattern_id, pattern.status, pattern.counters())
            .await?;
        Ok(pattern)
    }

    /// Cancel the series and every scheduled occurrence starting after
    /// `as_of` (defaults to now). Occurrences at or before `as_of` are
    /// untouched. Idempotent: re-invoking yields the same end state.
    pub async fn cancel_future(
        &self,
        pattern_id: Uuid,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<CancelOutcome> {
        let handle = self.locks.for_pattern(pattern_id);
        let _guard = handle.lock().await;

        let mut pattern = self.repository.load_pattern(pattern_id).await?;
        if pattern.status == PatternStatus::Completed {
            return Err(BooklineError::InvalidStateTransition(
                "completed series has no future occurrences to cancel".to_string(),
            ));
        }

        let as_of = as_of.unwrap_or_else(|| self.clock.now());
        let occurrences = self.repository.load_occurrences(pattern_id, None).await?;

        let mut cancelled = 0u32;
        let mut retained = 0u32;
        for mut occurrence in occurrences {
            if occurrence.start > as_of && occurrence.status == OccurrenceStatus::Scheduled {
                occurrence.status = OccurrenceStatus::Cancelled;
                self.repository.update_occurrence(&occurrence).await?;
                cancelled += 1;
            } else {
                retained += 1;
            }
        }

        pattern.status = PatternStatus::Cancelled;
        self.repository
            .update_pattern_status(pattern_id, pattern.status, pattern.counters())
            .await?;

        info!(pattern_id = %pattern_id, cancelled, retained, "cancelled series");
        Ok(CancelOutcome { cancelled, retained })
    }

    /// Shift the series anchor to `new_start_date`, keeping the rule's shape.
    ///
    /// Not-yet-occurred occurrences are cancelled - manual overrides
    /// included - and the next batch is regenerated from the new anchor.
    /// The counters are recomputed from the retained occurrences so the
    /// regenerated series still honors the original limit.
    pub async fn reschedule(
        &self,
        pattern_id: Uuid,
        new_start_date: NaiveDate,
    ) -> Result<RescheduleOutcome> {
        let handle = self.locks.for_pattern(pattern_id);
        let _guard = handle.lock().await;

        let mut pattern = self.repository.load_pattern(pattern_id).await?;
        if pattern.status != PatternStatus::Active {
            return Err(BooklineError::InvalidStateTransition(format!(
                "cannot reschedule a {} pattern",
                pattern.status
            )));
        }

        let now = self.clock.now();
        let today = now.with_timezone(&pattern.timezone).date_naive();
        if new_start_date < today {
            return Err(BooklineError::InvalidPatternDefinition(format!(
                "reschedule target {new_start_date} is in the past"
            )));
        }

        let mut existing = self.repository.load_occurrences(pattern_id, None).await?;
        let mut cancelled = 0u32;
        for occurrence in &mut existing {
            if occurrence.start > now && occurrence.status == OccurrenceStatus::Scheduled {
                occurrence.status = OccurrenceStatus::Cancelled;
                self.repository.update_occurrence(occurrence).await?;
                cancelled += 1;
            }
        }

        pattern.start_date = new_start_date;
        reconcile_counters(&mut pattern, &existing);
        self.repository.update_pattern(&pattern).await?;

        let requested = match pattern.remaining_capacity() {
            Some(remaining) => self.initial_batch.min(remaining),
            None => self.initial_batch,
        };
        let generation =
            self.run_generation(&mut pattern, existing, requested as usize, true).await?;

        info!(
            pattern_id = %pattern_id,
            cancelled,
            created = generation.created,
            "rescheduled series"
        );
        Ok(RescheduleOutcome { cancelled, generation })
    }

    /// Extend the series with the next `count` non-conflicting occurrences
    /// beyond the latest existing one.
    ///
    /// Conflicting candidates are recorded as skipped and generation
    /// continues past them. Fails with `LimitReached` when accepting `count`
    /// occurrences would exceed the pattern's limit - all-or-nothing, no
    /// partial commit in that case.
    pub async fn generate_more(&self, pattern_id: Uuid, count: u32) -> Result<GenerationOutcome> {
        if count == 0 || count > MAX_BATCH_SIZE {
            return Err(BooklineError::InvalidPatternDefinition(format!(
                "batch size must be within 1..={MAX_BATCH_SIZE}, got {count}"
            )));
        }

        let handle = self.locks.for_pattern(pattern_id);
        let _guard = handle.lock().await;

        let mut pattern = self.repository.load_pattern(pattern_id).await?;
        match pattern.status {
            PatternStatus::Active => {}
            PatternStatus::Paused => {
                return Err(BooklineError::InvalidStateTransition(
                    "paused pattern does not accept new occurrences".to_string(),
                ));
            }
            status => {
                return Err(BooklineError::InvalidStateTransition(format!(
                    "cannot extend a {status} pattern"
                )));
            }
        }

        let existing = self.repository.load_occurrences(pattern_id, None).await?;
        reconcile_counters(&mut pattern, &existing);

        if let Some(remaining) = pattern.remaining_capacity() {
            if count > remaining {
                return Err(BooklineError::LimitReached(format!(
                    "requested {count} occurrences but only {remaining} remain within the limit"
                )));
            }
        }

        self.run_generation(&mut pattern, existing, count as usize, false).await
    }

    /// Generate, conflict-check, and persist one batch.
    ///
    /// `from_anchor` restarts generation at the pattern's anchor (creation,
    /// reschedule); otherwise candidates start strictly beyond the latest
    /// existing occurrence. The caller has already bounded `requested`
    /// against the occurrence limit.
    async fn run_generation(
        &self,
        pattern: &mut RecurrencePattern,
        existing: Vec<Occurrence>,
        requested: usize,
        from_anchor: bool,
    ) -> Result<GenerationOutcome> {
        let horizon = if from_anchor {
            None
        } else {
            existing.iter().map(|occ| occ.start).max().map(|start| pattern.local_date_of(start))
        };

        let now = self.clock.now();
        let mut accepted: Vec<Occurrence> = Vec::new();
        let mut revived: Vec<Occurrence> = Vec::new();
        let mut skips: Vec<Occurrence> = Vec::new();
        let mut cursor = horizon;
        let mut exhausted = false;
        let mut scanned = 0usize;

        while accepted.len() + revived.len() < requested && scanned < MAX_CANDIDATE_SCAN {
            let need = requested - accepted.len() - revived.len();
            let batch = generate(pattern, cursor, need)?;
            let Some(last) = batch.last() else {
                exhausted = true;
                break;
            };
            cursor = Some(last.date);
            scanned += batch.len();

            let range = InstantRange::new(batch[0].start, last.end);
            let events = self.repository.load_calendar_events(pattern.resource_id, range).await?;

            for candidate in &batch {
                let slot = TimeSlot::new(candidate.start, candidate.end);

                if let Some(row) = existing.iter().find(|occ| occ.start == candidate.start) {
                    // Instant already materialized. Live rows stay untouched
                    // (the retry path); cancelled or skipped rows are revived
                    // when the slot has become clear.
                    if row.is_live() {
                        continue;
                    }
                    if candidate_conflict(&slot, now, &events, &existing, &accepted, &revived)
                        .is_none()
                    {
                        let mut occurrence = row.clone();
                        occurrence.status = OccurrenceStatus::Scheduled;
                        occurrence.manual_override = false;
                        revived.push(occurrence);
                    }
                    continue;
                }

                match candidate_conflict(&slot, now, &events, &existing, &accepted, &revived) {
                    None => {
                        accepted.push(Occurrence::scheduled(
                            pattern.id,
                            candidate.start,
                            candidate.end,
                        ));
                    }
                    Some(kind) => {
                        debug!(
                            pattern_id = %pattern.id,
                            date = %candidate.date,
                            conflict = %kind,
                            "candidate skipped"
                        );
                        skips.push(Occurrence::skipped(pattern.id, candidate.start, candidate.end));
                    }
                }
            }
        }

        let produced = accepted.len() + revived.len();
        let completed = exhausted && produced < requested && requested > 0;

        let mut rows: Vec<Occurrence> = Vec::with_capacity(accepted.len() + skips.len());
        rows.extend(accepted.iter().cloned());
        rows.extend(skips.iter().cloned());
        rows.sort_by_key(|occ| occ.start);
        if !rows.is_empty() {
            self.repository.save_occurrences(pattern.id, &rows).await?;
        }
        for occurrence in &revived {
            self.repository.update_occurrence(occurrence).await?;
        }

        pattern.created_occurrences += produced as u32;
        pattern.skipped_occurrences += skips.len() as u32;
        if completed {
            pattern.status = PatternStatus::Completed;
        }
        self.repository
            .update_pattern_status(pattern.id, pattern.status, pattern.counters())
            .await?;

        if produced == 0 && !skips.is_empty() {
            // The skip records and counters stay persisted; the caller learns
            // nothing was bookable.
            return Err(BooklineError::NoSlotsAvailable(skips.len() as u32));
        }

        let mut occurrences: Vec<Occurrence> = accepted;
        occurrences.extend(revived);
        occurrences.sort_by_key(|occ| occ.start);

        Ok(GenerationOutcome {
            created: produced as u32,
            skipped: skips.len() as u32,
            completed,
            occurrences,
        })
    }
}

/// Conflict verdict for one generated candidate: the calendar check plus the
/// no-two-scheduled-occurrences-overlap invariant of the pattern itself.
fn candidate_conflict(
    slot: &TimeSlot,
    now: DateTime<Utc>,
    events: &[CalendarEvent],
    existing: &[Occurrence],
    accepted: &[Occurrence],
    revived: &[Occurrence],
) -> Option<ConflictKind> {
    if let SlotVerdict::Conflict(kind) = check_slot(slot, now, events, None) {
        return Some(kind);
    }
    let sibling_overlap = existing
        .iter()
        .chain(accepted)
        .chain(revived)
        .any(|occ| occ.is_live() && occ.start != slot.start && slot.overlaps(&occ.slot()));
    sibling_overlap.then_some(ConflictKind::Overlap)
}

/// Re-derive the counters from the occurrence log.
///
/// The log is the source of truth; the persisted counters are a cache that
/// can lag behind after an interrupted batch.
fn reconcile_counters(pattern: &mut RecurrencePattern, occurrences: &[Occurrence]) {
    let created = occurrences.iter().filter(|occ| occ.is_live()).count() as u32;
    let skipped = occurrences
        .iter()
        .filter(|occ| occ.status == OccurrenceStatus::Skipped)
        .count() as u32;

    if created != pattern.created_occurrences || skipped != pattern.skipped_occurrences {
        warn!(
            pattern_id = %pattern.id,
            counter_created = pattern.created_occurrences,
            log_created = created,
            "pattern counters diverged from occurrence log, reconciling"
        );
        pattern.created_occurrences = created;
        pattern.skipped_occurrences = skipped;
    }
}
