//! Worker pool: a fixed number of concurrent workers over a shared queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use taskmill_core::{PoolConfig, PoolStats, TaskEvent, TaskId};

use crate::metrics::PoolMetrics;
use crate::queue::TaskQueue;
use crate::worker::{FailureCallback, InFlightMap, WorkerContext, run_worker};

/// A task force-terminated mid-flight by `stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortedTask {
    pub task_id: TaskId,
    pub job_type: String,
    pub worker: String,
}

/// Outcome of a graceful shutdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopReport {
    /// True when every in-flight operation finished within the drain window.
    pub drained: bool,
    /// Items aborted mid-flight, in no particular order.
    pub aborted: Vec<AbortedTask>,
}

/// Builder for a [`TaskPool`].
pub struct PoolBuilder {
    config: PoolConfig,
    on_failure: Option<Arc<FailureCallback>>,
}

impl PoolBuilder {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            on_failure: None,
        }
    }

    /// Invoke `callback` for every operation failure, after metrics and
    /// events have been recorded.
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(TaskId, &str, &str) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    /// Launch the workers against `queue`.
    pub fn start(self, queue: TaskQueue) -> TaskPool {
        TaskPool::start_inner(queue, self.config, self.on_failure)
    }
}

/// A fixed set of concurrent workers consuming one shared queue.
///
/// Concurrency is fixed at startup and caps resource usage regardless of
/// queue depth. One worker's failure never blocks or crashes its siblings.
pub struct TaskPool {
    queue: TaskQueue,
    config: PoolConfig,
    workers: Vec<(String, JoinHandle<()>)>,
    shutdown: CancellationToken,
    metrics: Arc<PoolMetrics>,
    in_flight: InFlightMap,
}

impl TaskPool {
    /// Builder with a failure callback and other options.
    pub fn builder(config: PoolConfig) -> PoolBuilder {
        PoolBuilder::new(config)
    }

    /// Launch `config.concurrency` workers against `queue`.
    pub fn start(queue: TaskQueue, config: PoolConfig) -> TaskPool {
        Self::start_inner(queue, config, None)
    }

    fn start_inner(
        queue: TaskQueue,
        config: PoolConfig,
        on_failure: Option<Arc<FailureCallback>>,
    ) -> TaskPool {
        let shutdown = CancellationToken::new();
        let metrics = Arc::new(PoolMetrics::default());
        let in_flight: InFlightMap = Arc::new(Mutex::new(HashMap::new()));
        let events = queue.event_sender();

        info!(concurrency = config.concurrency, "starting worker pool");

        let mut workers = Vec::with_capacity(config.concurrency);
        for n in 1..=config.concurrency {
            let name = format!("worker-{n}");
            let context = WorkerContext {
                name: name.clone(),
                queue: queue.clone(),
                shutdown: shutdown.clone(),
                metrics: metrics.clone(),
                events: events.clone(),
                on_failure: on_failure.clone(),
                in_flight: in_flight.clone(),
            };
            workers.push((name, tokio::spawn(run_worker(context))));
        }

        TaskPool {
            queue,
            config,
            workers,
            shutdown,
            metrics,
            in_flight,
        }
    }

    /// Advisory statistics for the pool and its queue.
    pub fn stats(&self) -> PoolStats {
        self.metrics.snapshot(self.queue.count())
    }

    /// Subscribe to pool and queue events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.queue.subscribe()
    }

    /// The shared queue this pool consumes from.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Gracefully stop with the configured drain timeout.
    pub async fn stop(self) -> StopReport {
        let drain_timeout = self.config.drain_timeout();
        self.stop_within(drain_timeout).await
    }

    /// Signal cancellation to every worker, wait up to `drain_timeout` for
    /// in-flight operations to finish, then force-terminate stragglers and
    /// report the items they were holding.
    pub async fn stop_within(mut self, drain_timeout: Duration) -> StopReport {
        info!("stopping worker pool");
        self.shutdown.cancel();

        let deadline = tokio::time::Instant::now() + drain_timeout;
        let mut drained = true;
        for (name, handle) in &mut self.workers {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, &mut *handle).await {
                Ok(_) => {}
                Err(_) => {
                    warn!(worker = %name, "drain timeout elapsed, aborting worker");
                    handle.abort();
                    drained = false;
                }
            }
        }

        let events = self.queue.event_sender();
        let mut aborted = Vec::new();
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            for (worker, task) in in_flight.drain() {
                self.metrics.task_aborted();
                let _ = events.send(TaskEvent::TaskAborted {
                    task_id: task.task_id,
                    job_type: task.job_type.clone(),
                    worker: worker.clone(),
                    timestamp: Utc::now(),
                });
                aborted.push(AbortedTask {
                    task_id: task.task_id,
                    job_type: task.job_type,
                    worker,
                });
            }
        }

        info!(drained, aborted = aborted.len(), "worker pool stopped");
        StopReport { drained, aborted }
    }
}
