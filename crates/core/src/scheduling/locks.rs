//! Per-pattern serialization of mutating operations.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Registry of per-pattern mutexes.
///
/// Every mutating operation on a pattern is a read-then-write sequence over
/// its occurrence set; two of them interleaved could double-generate slots or
/// corrupt the counters. Reads stay lock-free.
#[derive(Debug, Default)]
pub struct PatternLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl PatternLocks {
    pub fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    /// Lock handle for one pattern, created on first use.
    pub fn for_pattern(&self, pattern_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(pattern_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
