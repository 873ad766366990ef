//! Pool metrics, owned by the dispatcher.
//!
//! An explicit object with the pool's lifecycle: created alongside the
//! workers and dropped with them, never process-wide state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use taskmill_core::PoolStats;

/// Live counters for a worker pool. Snapshot via [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct PoolMetrics {
    in_flight: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    aborted: AtomicU64,
    by_type: Mutex<TypeCounters>,
}

#[derive(Debug, Default)]
struct TypeCounters {
    completed: HashMap<String, u64>,
    failed: HashMap<String, u64>,
}

impl PoolMetrics {
    pub(crate) fn task_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_completed(&self, job_type: &str) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        let mut counters = self.by_type.lock().unwrap();
        *counters.completed.entry(job_type.to_string()).or_default() += 1;
    }

    pub(crate) fn task_failed(&self, job_type: &str) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        let mut counters = self.by_type.lock().unwrap();
        *counters.failed.entry(job_type.to_string()).or_default() += 1;
    }

    pub(crate) fn task_aborted(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters. `queued` is supplied by the caller from the
    /// queue's depth mirror.
    pub fn snapshot(&self, queued: usize) -> PoolStats {
        let counters = self.by_type.lock().unwrap();
        PoolStats {
            queued: queued as u64,
            in_flight: self.in_flight.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            completed_by_type: counters.completed.clone(),
            failed_by_type: counters.failed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = PoolMetrics::default();
        metrics.task_started();
        metrics.task_started();
        metrics.task_completed("report");
        metrics.task_failed("import");

        let stats = metrics.snapshot(3);
        assert_eq!(stats.queued, 3);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed_by_type["report"], 1);
        assert_eq!(stats.failed_by_type["import"], 1);
    }
}
