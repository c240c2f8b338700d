//! Schema bootstrap for the scheduler database.

use bookline_domain::Result;
use rusqlite::Connection;

use crate::errors::InfraError;

/// Create the scheduler tables when they do not exist yet. Safe to run on
/// every startup.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS patterns (
            id TEXT PRIMARY KEY,
            resource_id TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            rule TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            start_time TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            timezone TEXT NOT NULL,
            occurrence_limit INTEGER,
            status TEXT NOT NULL,
            created_occurrences INTEGER NOT NULL DEFAULT 0,
            skipped_occurrences INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS occurrences (
            id TEXT PRIMARY KEY,
            pattern_id TEXT NOT NULL REFERENCES patterns(id),
            start_ts INTEGER NOT NULL,
            end_ts INTEGER NOT NULL,
            status TEXT NOT NULL,
            manual_override INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            UNIQUE(pattern_id, start_ts)
        );

        CREATE INDEX IF NOT EXISTS idx_occurrences_pattern_start
            ON occurrences(pattern_id, start_ts);

        CREATE TABLE IF NOT EXISTS calendar_events (
            id TEXT PRIMARY KEY,
            resource_id TEXT NOT NULL,
            start_ts INTEGER NOT NULL,
            end_ts INTEGER NOT NULL,
            kind TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_calendar_events_resource
            ON calendar_events(resource_id, start_ts);",
    )
    .map_err(|e| InfraError::from(e).into())
}
