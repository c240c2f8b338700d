//! Domain-level constants
//!
//! Centralized location for scheduler defaults shared by the core and the
//! configuration layer.

/// Occurrences materialized when a pattern is created or rescheduled.
pub const DEFAULT_INITIAL_BATCH: u32 = 10;

/// Hard cap on a single `generate_more` request.
pub const MAX_BATCH_SIZE: u32 = 100;

/// Upper bound on candidate dates examined in one generation run, so a
/// fully-blocked resource cannot spin an unbounded series forever.
pub const MAX_CANDIDATE_SCAN: usize = 512;

/// Default connection pool size for the SQLite adapter.
pub const DEFAULT_POOL_SIZE: u32 = 4;
