//! Configuration structures
//!
//! Plain data only; loading lives in the infra crate.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_INITIAL_BATCH, DEFAULT_POOL_SIZE};

/// Top-level configuration for a Bookline deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

/// SQLite adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Series generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Batch size used when a pattern is created or rescheduled.
    pub initial_batch_size: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self { initial_batch_size: DEFAULT_INITIAL_BATCH }
    }
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}
