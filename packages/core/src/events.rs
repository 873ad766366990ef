//! Event types for observing queue and pool activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Priority, TaskId};

/// Events broadcast by the queue and worker pool.
///
/// Hosts subscribe to drive status displays or external reporting; dropping
/// events under subscriber lag is acceptable (broadcast semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    /// An item was accepted into the queue.
    TaskEnqueued {
        task_id: TaskId,
        job_type: String,
        priority: Priority,
        timestamp: DateTime<Utc>,
    },
    /// A worker began executing an item's operation.
    TaskStarted {
        task_id: TaskId,
        job_type: String,
        worker: String,
        timestamp: DateTime<Utc>,
    },
    /// An operation completed successfully.
    TaskCompleted {
        task_id: TaskId,
        job_type: String,
        worker: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// An operation failed (error, timeout, or panic). The item is discarded
    /// after one attempt.
    TaskFailed {
        task_id: TaskId,
        job_type: String,
        worker: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// An item was force-terminated mid-flight during shutdown.
    TaskAborted {
        task_id: TaskId,
        job_type: String,
        worker: String,
        timestamp: DateTime<Utc>,
    },
    /// The queue was closed; no further enqueues will be accepted.
    QueueClosed { timestamp: DateTime<Utc> },
    /// A worker loop started.
    WorkerStarted {
        worker: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker loop exited.
    WorkerStopped {
        worker: String,
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TaskEvent::TaskEnqueued { timestamp, .. } => *timestamp,
            TaskEvent::TaskStarted { timestamp, .. } => *timestamp,
            TaskEvent::TaskCompleted { timestamp, .. } => *timestamp,
            TaskEvent::TaskFailed { timestamp, .. } => *timestamp,
            TaskEvent::TaskAborted { timestamp, .. } => *timestamp,
            TaskEvent::QueueClosed { timestamp } => *timestamp,
            TaskEvent::WorkerStarted { timestamp, .. } => *timestamp,
            TaskEvent::WorkerStopped { timestamp, .. } => *timestamp,
        }
    }

    /// Get the task ID associated with this event, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            TaskEvent::TaskEnqueued { task_id, .. } => Some(*task_id),
            TaskEvent::TaskStarted { task_id, .. } => Some(*task_id),
            TaskEvent::TaskCompleted { task_id, .. } => Some(*task_id),
            TaskEvent::TaskFailed { task_id, .. } => Some(*task_id),
            TaskEvent::TaskAborted { task_id, .. } => Some(*task_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            TaskEvent::TaskEnqueued {
                task_id, priority, ..
            } => format!("Task {} enqueued at priority {}", task_id, priority),
            TaskEvent::TaskStarted {
                task_id, worker, ..
            } => format!("Task {} started by {}", task_id, worker),
            TaskEvent::TaskCompleted {
                task_id,
                duration_ms,
                ..
            } => format!("Task {} completed in {}ms", task_id, duration_ms),
            TaskEvent::TaskFailed { task_id, error, .. } => {
                format!("Task {} failed: {}", task_id, error)
            }
            TaskEvent::TaskAborted {
                task_id, worker, ..
            } => format!("Task {} aborted on {}", task_id, worker),
            TaskEvent::QueueClosed { .. } => "Queue closed".to_string(),
            TaskEvent::WorkerStarted { worker, .. } => format!("Worker {} started", worker),
            TaskEvent::WorkerStopped { worker, .. } => format!("Worker {} stopped", worker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tagging() {
        let event = TaskEvent::TaskEnqueued {
            task_id: TaskId::new(),
            job_type: "report".to_string(),
            priority: Priority::HIGH,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "task_enqueued");
        assert_eq!(json["job_type"], "report");
    }

    #[test]
    fn accessors() {
        let event = TaskEvent::QueueClosed {
            timestamp: Utc::now(),
        };
        assert!(event.task_id().is_none());
        assert_eq!(event.description(), "Queue closed");
    }
}
