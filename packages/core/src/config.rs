//! Configuration for the queue and the worker pool.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a bounded task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of items the queue may hold. Producers attempting to
    /// enqueue beyond this suspend until space frees.
    pub capacity: usize,
    /// Buffer size of the broadcast event channel.
    pub event_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            event_buffer: 1024,
        }
    }
}

impl QueueConfig {
    /// Create a config with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Set the event channel buffer size.
    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }
}

/// Configuration for a worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent workers. Fixed at startup; caps resource usage
    /// regardless of queue depth.
    pub concurrency: usize,
    /// Default time `stop` waits for in-flight operations before
    /// force-terminating workers (seconds).
    pub drain_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            drain_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    /// Create a config with the given worker count.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }

    /// Set the default drain timeout for `stop`.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout_secs = timeout.as_secs();
        self
    }

    /// The default drain timeout as a [`Duration`].
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let q = QueueConfig::default();
        assert_eq!(q.capacity, 64);
        let p = PoolConfig::default();
        assert_eq!(p.concurrency, 4);
        assert_eq!(p.drain_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn serde_fills_missing_fields() {
        let p: PoolConfig = serde_json::from_str(r#"{"concurrency": 8}"#).unwrap();
        assert_eq!(p.concurrency, 8);
        assert_eq!(p.drain_timeout_secs, 30);
    }
}
