//! Worker loop: dequeue, execute, report, repeat.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use taskmill_core::{OperationError, TaskEvent, TaskId, WorkItem};

use crate::metrics::PoolMetrics;
use crate::queue::{DequeueError, TaskQueue};

/// Callback invoked for every operation failure, after metrics and events.
/// Arguments: task id, job type, error message.
pub type FailureCallback = dyn Fn(TaskId, &str, &str) + Send + Sync;

/// A task currently executing on a worker.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub task_id: TaskId,
    pub job_type: String,
}

/// In-flight registry keyed by worker name, shared between the workers and
/// the pool's shutdown path.
pub(crate) type InFlightMap = Arc<Mutex<HashMap<String, InFlight>>>;

pub(crate) struct WorkerContext {
    pub name: String,
    pub queue: TaskQueue,
    pub shutdown: CancellationToken,
    pub metrics: Arc<PoolMetrics>,
    pub events: broadcast::Sender<TaskEvent>,
    pub on_failure: Option<Arc<FailureCallback>>,
    pub in_flight: InFlightMap,
}

/// Run one worker until shutdown is requested or the queue drains closed.
pub(crate) async fn run_worker(ctx: WorkerContext) {
    debug!(worker = %ctx.name, "worker started");
    let _ = ctx.events.send(TaskEvent::WorkerStarted {
        worker: ctx.name.clone(),
        timestamp: Utc::now(),
    });

    loop {
        let item = match ctx.queue.dequeue(&ctx.shutdown).await {
            Ok(item) => item,
            Err(DequeueError::Cancelled) | Err(DequeueError::Closed) => break,
        };
        execute(&ctx, item).await;
    }

    debug!(worker = %ctx.name, "worker stopped");
    let _ = ctx.events.send(TaskEvent::WorkerStopped {
        worker: ctx.name.clone(),
        timestamp: Utc::now(),
    });
}

/// Execute one item's operation and report the outcome. Failures are
/// contained here; nothing propagates to the worker loop.
async fn execute(ctx: &WorkerContext, item: WorkItem) {
    let WorkItem {
        id,
        job_type,
        timeout,
        operation,
        ..
    } = item;

    ctx.in_flight.lock().unwrap().insert(
        ctx.name.clone(),
        InFlight {
            task_id: id,
            job_type: job_type.clone(),
        },
    );
    ctx.metrics.task_started();
    let _ = ctx.events.send(TaskEvent::TaskStarted {
        task_id: id,
        job_type: job_type.clone(),
        worker: ctx.name.clone(),
        timestamp: Utc::now(),
    });

    let token = ctx.shutdown.child_token();
    let started = Instant::now();
    let future = AssertUnwindSafe(operation.run(token)).catch_unwind();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(run) => flatten(run),
            Err(_) => Err(format!("operation timed out after {:?}", limit)),
        },
        None => flatten(future.await),
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    ctx.in_flight.lock().unwrap().remove(&ctx.name);

    match outcome {
        Ok(()) => {
            ctx.metrics.task_completed(&job_type);
            debug!(task = %id, job_type = %job_type, duration_ms, "task completed");
            let _ = ctx.events.send(TaskEvent::TaskCompleted {
                task_id: id,
                job_type,
                worker: ctx.name.clone(),
                duration_ms,
                timestamp: Utc::now(),
            });
        }
        Err(error) => {
            ctx.metrics.task_failed(&job_type);
            warn!(task = %id, job_type = %job_type, %error, "task failed");
            let _ = ctx.events.send(TaskEvent::TaskFailed {
                task_id: id,
                job_type: job_type.clone(),
                worker: ctx.name.clone(),
                error: error.clone(),
                timestamp: Utc::now(),
            });
            if let Some(callback) = &ctx.on_failure {
                callback(id, &job_type, &error);
            }
        }
    }
}

/// Collapse error and panic outcomes into one failure message.
fn flatten(result: Result<Result<(), OperationError>, Box<dyn Any + Send>>) -> Result<(), String> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(error.to_string()),
        Err(payload) => Err(panic_message(payload)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("operation panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("operation panicked: {message}")
    } else {
        "operation panicked".to_string()
    }
}
