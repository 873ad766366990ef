//! Snapshot statistics for a pool and its queue.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Point-in-time counters for a worker pool. Advisory only: taken from
/// relaxed atomics, so a snapshot may lag concurrent activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolStats {
    /// Items currently held in the queue.
    pub queued: u64,
    /// Items currently being executed by workers.
    pub in_flight: u64,
    /// Operations that completed successfully.
    pub completed: u64,
    /// Operations that failed (error, timeout, or panic).
    pub failed: u64,
    /// Items aborted mid-flight during shutdown.
    pub aborted: u64,
    /// Completed counts per job type.
    pub completed_by_type: HashMap<String, u64>,
    /// Failed counts per job type.
    pub failed_by_type: HashMap<String, u64>,
}

impl PoolStats {
    /// Items either queued or executing.
    pub fn active(&self) -> u64 {
        self.queued + self.in_flight
    }

    /// Total operations that ran to an outcome.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage, if anything has been processed.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }
}
