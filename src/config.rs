//! Engine tuning knobs, injected through the service constructor

use std::time::Duration;

/// Bounds for the idempotency guard and the inventory locator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a completed submission suppresses an identical retry.
    pub dedup_ttl: Duration,
    /// Guard entries are swept once the table grows past this.
    pub dedup_capacity: usize,
    /// Maximum records one category scan may visit.
    pub locate_batch_limit: usize,
    /// Wall-clock budget for one category scan.
    pub locate_time_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_ttl: Duration::from_secs(15),
            dedup_capacity: 1024,
            locate_batch_limit: 512,
            locate_time_budget: Duration::from_millis(250),
        }
    }
}
