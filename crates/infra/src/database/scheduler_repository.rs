//! SQLite-backed implementation of the `SchedulerRepository` port.
//!
//! Occurrence writes are keyed on `(pattern_id, start_ts)` with
//! `ON CONFLICT DO NOTHING`, which is what makes generation retries safe:
//! re-persisting an identical batch inserts nothing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, instrument};
use uuid::Uuid;

use bookline_core::SchedulerRepository;
use bookline_domain::{
    BooklineError, CalendarEvent, Config, EventKind, InstantRange, Occurrence, OccurrenceStatus,
    PatternCounters, PatternStatus, RecurrencePattern, Result,
};

use crate::errors::InfraError;

use super::schema::initialize_schema;

/// Build the SQLite repository described by `config`.
pub fn build_repository(config: &Config) -> Result<SqliteSchedulerRepository> {
    SqliteSchedulerRepository::open(&config.database.path, config.database.pool_size)
}

/// SQLite implementation of the scheduler storage port.
pub struct SqliteSchedulerRepository {
    pool: Arc<r2d2::Pool<SqliteConnectionManager>>,
}

impl SqliteSchedulerRepository {
    /// Open (and bootstrap) the database at `path`.
    pub fn open(path: &str, pool_size: u32) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = r2d2::Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| BooklineError::from(InfraError::from(e)))?;

        let repository = Self { pool: Arc::new(pool) };
        initialize_schema(&*repository.conn()?)?;
        Ok(repository)
    }

    /// Seed an external calendar event. Test/bootstrap helper; the port only
    /// ever reads events.
    pub fn insert_calendar_event(&self, event: &CalendarEvent) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO calendar_events (id, resource_id, start_ts, end_ts, kind)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id.to_string(),
                event.resource_id.to_string(),
                event.start.timestamp(),
                event.end.timestamp(),
                event.kind.as_str(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| BooklineError::from(InfraError::from(e)))
    }
}

#[async_trait]
impl SchedulerRepository for SqliteSchedulerRepository {
    #[instrument(skip(self, pattern), fields(pattern_id = %pattern.id))]
    async fn create_pattern(&self, pattern: &RecurrencePattern) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();
        let rule = serde_json::to_string(&pattern.rule)
            .map_err(|e| BooklineError::from(InfraError::from(e)))?;

        conn.execute(
            "INSERT INTO patterns (
                id, resource_id, owner_id, rule, start_date, end_date, start_time,
                duration_minutes, timezone, occurrence_limit, status,
                created_occurrences, skipped_occurrences, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                pattern.id.to_string(),
                pattern.resource_id.to_string(),
                pattern.owner_id.to_string(),
                rule,
                pattern.start_date.to_string(),
                pattern.end_date.map(|d| d.to_string()),
                pattern.start_time.to_string(),
                pattern.duration_minutes,
                pattern.timezone.name(),
                pattern.occurrence_limit,
                pattern.status.as_str(),
                pattern.created_occurrences,
                pattern.skipped_occurrences,
                now,
                now,
            ],
        )
        .map_err(db_err)?;

        debug!("pattern persisted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_pattern(&self, pattern_id: Uuid) -> Result<RecurrencePattern> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, resource_id, owner_id, rule, start_date, end_date, start_time,
                        duration_minutes, timezone, occurrence_limit, status,
                        created_occurrences, skipped_occurrences
                 FROM patterns WHERE id = ?1",
                params![pattern_id.to_string()],
                |row| {
                    Ok(PatternRow {
                        id: row.get(0)?,
                        resource_id: row.get(1)?,
                        owner_id: row.get(2)?,
                        rule: row.get(3)?,
                        start_date: row.get(4)?,
                        end_date: row.get(5)?,
                        start_time: row.get(6)?,
                        duration_minutes: row.get(7)?,
                        timezone: row.get(8)?,
                        occurrence_limit: row.get(9)?,
                        status: row.get(10)?,
                        created_occurrences: row.get(11)?,
                        skipped_occurrences: row.get(12)?,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    BooklineError::NotFound(format!("pattern {pattern_id}"))
                }
                other => db_err(other),
            })?;

        row.into_pattern()
    }

    #[instrument(skip(self, pattern), fields(pattern_id = %pattern.id))]
    async fn update_pattern(&self, pattern: &RecurrencePattern) -> Result<()> {
        let conn = self.conn()?;
        let rule = serde_json::to_string(&pattern.rule)
            .map_err(|e| BooklineError::from(InfraError::from(e)))?;

        let changed = conn
            .execute(
                "UPDATE patterns SET
                    rule = ?2, start_date = ?3, end_date = ?4, start_time = ?5,
                    duration_minutes = ?6, timezone = ?7, occurrence_limit = ?8,
                    status = ?9, created_occurrences = ?10, skipped_occurrences = ?11,
                    updated_at = ?12
                 WHERE id = ?1",
                params![
                    pattern.id.to_string(),
                    rule,
                    pattern.start_date.to_string(),
                    pattern.end_date.map(|d| d.to_string()),
                    pattern.start_time.to_string(),
                    pattern.duration_minutes,
                    pattern.timezone.name(),
                    pattern.occurrence_limit,
                    pattern.status.as_str(),
                    pattern.created_occurrences,
                    pattern.skipped_occurrences,
                    Utc::now().timestamp(),
                ],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(BooklineError::NotFound(format!("pattern {}", pattern.id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_pattern_status(
        &self,
        pattern_id: Uuid,
        status: PatternStatus,
        counters: PatternCounters,
    ) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE patterns SET status = ?2, created_occurrences = ?3,
                        skipped_occurrences = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    pattern_id.to_string(),
                    status.as_str(),
                    counters.created,
                    counters.skipped,
                    Utc::now().timestamp(),
                ],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(BooklineError::NotFound(format!("pattern {pattern_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_occurrences(
        &self,
        pattern_id: Uuid,
        range: Option<InstantRange>,
    ) -> Result<Vec<Occurrence>> {
        let conn = self.conn()?;
        let mut rows: Vec<OccurrenceRow> = Vec::new();

        match range {
            Some(range) => {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, pattern_id, start_ts, end_ts, status, manual_override
                         FROM occurrences
                         WHERE pattern_id = ?1 AND start_ts < ?2 AND end_ts > ?3
                         ORDER BY start_ts",
                    )
                    .map_err(db_err)?;
                let mapped = stmt
                    .query_map(
                        params![
                            pattern_id.to_string(),
                            range.end.timestamp(),
                            range.start.timestamp()
                        ],
                        OccurrenceRow::from_row,
                    )
                    .map_err(db_err)?;
                for row in mapped {
                    rows.push(row.map_err(db_err)?);
                }
            }
            None => {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, pattern_id, start_ts, end_ts, status, manual_override
                         FROM occurrences WHERE pattern_id = ?1 ORDER BY start_ts",
                    )
                    .map_err(db_err)?;
                let mapped = stmt
                    .query_map(params![pattern_id.to_string()], OccurrenceRow::from_row)
                    .map_err(db_err)?;
                for row in mapped {
                    rows.push(row.map_err(db_err)?);
                }
            }
        }

        rows.into_iter().map(OccurrenceRow::into_occurrence).collect()
    }

    #[instrument(skip(self, occurrences), fields(batch = occurrences.len()))]
    async fn save_occurrences(
        &self,
        pattern_id: Uuid,
        occurrences: &[Occurrence],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now = Utc::now().timestamp();

        let mut inserted = 0;
        for occurrence in occurrences {
            inserted += tx
                .execute(
                    "INSERT INTO occurrences
                        (id, pattern_id, start_ts, end_ts, status, manual_override, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(pattern_id, start_ts) DO NOTHING",
                    params![
                        occurrence.id.to_string(),
                        pattern_id.to_string(),
                        occurrence.start.timestamp(),
                        occurrence.end.timestamp(),
                        occurrence.status.as_str(),
                        occurrence.manual_override,
                        now,
                    ],
                )
                .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        debug!(inserted, "occurrence batch saved");
        Ok(inserted)
    }

    #[instrument(skip(self, occurrence), fields(occurrence_id = %occurrence.id))]
    async fn update_occurrence(&self, occurrence: &Occurrence) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE occurrences SET start_ts = ?2, end_ts = ?3, status = ?4,
                        manual_override = ?5
                 WHERE id = ?1",
                params![
                    occurrence.id.to_string(),
                    occurrence.start.timestamp(),
                    occurrence.end.timestamp(),
                    occurrence.status.as_str(),
                    occurrence.manual_override,
                ],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(BooklineError::NotFound(format!("occurrence {}", occurrence.id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_calendar_events(
        &self,
        resource_id: Uuid,
        range: InstantRange,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.conn()?;
        let mut events: Vec<CalendarEvent> = Vec::new();

        let mut stmt = conn
            .prepare(
                "SELECT id, resource_id, start_ts, end_ts, kind
                 FROM calendar_events
                 WHERE resource_id = ?1 AND start_ts < ?2 AND end_ts > ?3
                 ORDER BY start_ts",
            )
            .map_err(db_err)?;
        let mapped = stmt
            .query_map(
                params![resource_id.to_string(), range.end.timestamp(), range.start.timestamp()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .map_err(db_err)?;
        for row in mapped {
            let (id, resource, start_ts, end_ts, kind) = row.map_err(db_err)?;
            events.push(CalendarEvent {
                id: parse_uuid(&id, "event id")?,
                resource_id: parse_uuid(&resource, "resource id")?,
                start: instant_from_ts(start_ts)?,
                end: instant_from_ts(end_ts)?,
                kind: kind.parse::<EventKind>()?,
            });
        }

        // Scheduled occurrences surface as booked events carrying the
        // occurrence id, so interactive re-checks can exclude the slot being
        // moved.
        let mut stmt = conn
            .prepare(
                "SELECT o.id, o.start_ts, o.end_ts
                 FROM occurrences o
                 JOIN patterns p ON p.id = o.pattern_id
                 WHERE p.resource_id = ?1 AND o.status = 'scheduled'
                   AND o.start_ts < ?2 AND o.end_ts > ?3
                 ORDER BY o.start_ts",
            )
            .map_err(db_err)?;
        let mapped = stmt
            .query_map(
                params![resource_id.to_string(), range.end.timestamp(), range.start.timestamp()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .map_err(db_err)?;
        for row in mapped {
            let (id, start_ts, end_ts) = row.map_err(db_err)?;
            events.push(CalendarEvent {
                id: parse_uuid(&id, "occurrence id")?,
                resource_id,
                start: instant_from_ts(start_ts)?,
                end: instant_from_ts(end_ts)?,
                kind: EventKind::Booked,
            });
        }

        Ok(events)
    }
}

fn db_err(e: rusqlite::Error) -> BooklineError {
    InfraError::from(e).into()
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| BooklineError::Persistence(format!("invalid {what} '{value}': {e}")))
}

fn instant_from_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| BooklineError::Persistence(format!("timestamp {ts} out of range")))
}

/// Raw pattern row, parsed into the domain type outside the rusqlite closure.
struct PatternRow {
    id: String,
    resource_id: String,
    owner_id: String,
    rule: String,
    start_date: String,
    end_date: Option<String>,
    start_time: String,
    duration_minutes: u32,
    timezone: String,
    occurrence_limit: Option<u32>,
    status: String,
    created_occurrences: u32,
    skipped_occurrences: u32,
}

impl PatternRow {
    fn into_pattern(self) -> Result<RecurrencePattern> {
        let rule = serde_json::from_str(&self.rule)
            .map_err(|e| BooklineError::from(InfraError::from(e)))?;
        let start_date = self
            .start_date
            .parse::<NaiveDate>()
            .map_err(|e| BooklineError::Persistence(format!("invalid start date: {e}")))?;
        let end_date = match self.end_date {
            Some(text) => Some(
                text.parse::<NaiveDate>()
                    .map_err(|e| BooklineError::Persistence(format!("invalid end date: {e}")))?,
            ),
            None => None,
        };
        let start_time = self
            .start_time
            .parse::<NaiveTime>()
            .map_err(|e| BooklineError::Persistence(format!("invalid start time: {e}")))?;
        let timezone = self
            .timezone
            .parse::<Tz>()
            .map_err(|e| BooklineError::Persistence(format!("unknown timezone: {e}")))?;

        Ok(RecurrencePattern {
            id: parse_uuid(&self.id, "pattern id")?,
            resource_id: parse_uuid(&self.resource_id, "resource id")?,
            owner_id: parse_uuid(&self.owner_id, "owner id")?,
            rule,
            start_date,
            end_date,
            start_time,
            duration_minutes: self.duration_minutes,
            timezone,
            occurrence_limit: self.occurrence_limit,
            status: self.status.parse()?,
            created_occurrences: self.created_occurrences,
            skipped_occurrences: self.skipped_occurrences,
        })
    }
}

/// Raw occurrence row, parsed outside the rusqlite closure.
struct OccurrenceRow {
    id: String,
    pattern_id: String,
    start_ts: i64,
    end_ts: i64,
    status: String,
    manual_override: bool,
}

impl OccurrenceRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pattern_id: row.get(1)?,
            start_ts: row.get(2)?,
            end_ts: row.get(3)?,
            status: row.get(4)?,
            manual_override: row.get(5)?,
        })
    }

    fn into_occurrence(self) -> Result<Occurrence> {
        Ok(Occurrence {
            id: parse_uuid(&self.id, "occurrence id")?,
            pattern_id: parse_uuid(&self.pattern_id, "pattern id")?,
            start: instant_from_ts(self.start_ts)?,
            end: instant_from_ts(self.end_ts)?,
            status: self.status.parse::<OccurrenceStatus>()?,
            manual_override: self.manual_override,
        })
    }
}
