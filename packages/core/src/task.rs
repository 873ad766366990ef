//! Work-item domain types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// Unique identifier for a work item, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Create a new unique task ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a task ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dispatch priority for a work item. Higher values are dequeued sooner;
/// ties are broken by enqueue order (oldest first).
///
/// Any integer value is valid. The named levels are conventions, not an
/// exhaustive set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl Priority {
    pub const LOW: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(10);
    pub const HIGH: Priority = Priority(20);
    pub const CRITICAL: Priority = Priority(30);
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Priority::LOW => write!(f, "low"),
            Priority::NORMAL => write!(f, "normal"),
            Priority::HIGH => write!(f, "high"),
            Priority::CRITICAL => write!(f, "critical"),
            Priority(n) => write!(f, "{}", n),
        }
    }
}

/// Error produced by a work item's operation during execution.
///
/// Local to one item: an operation failure is reported and the item is
/// discarded; it never propagates to the queue or to other workers.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct OperationError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl OperationError {
    /// Create an operation error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation error wrapping an underlying error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Future type returned by work-item operations.
pub type OperationFuture = BoxFuture<'static, Result<(), OperationError>>;

/// The deferred computation a work item carries.
///
/// Invoked at most once, by the single worker that dequeued the item. The
/// [`CancellationToken`] passed in is a child of the pool's shutdown token.
/// Cancellation is cooperative only: an operation that never checks the
/// token cannot be interrupted, and on shutdown its surrounding worker task
/// is force-terminated once the drain timeout elapses.
pub struct Operation(Box<dyn FnOnce(CancellationToken) -> OperationFuture + Send + 'static>);

impl Operation {
    /// Wrap a closure producing the operation's future.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> OperationFuture + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Consume the operation, producing its future.
    pub fn run(self, token: CancellationToken) -> OperationFuture {
        (self.0)(token)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Operation(..)")
    }
}

/// A work item: one immutable unit of deferred work.
///
/// Created by a producer, held in the queue, dequeued by exactly one worker,
/// executed, then discarded. Workers never mutate an item, only invoke its
/// operation.
#[derive(Debug)]
pub struct WorkItem {
    /// Unique identifier for this item.
    pub id: TaskId,
    /// Classification tag, used for metrics and routing only. Dispatch order
    /// never depends on it.
    pub job_type: String,
    /// Execution priority.
    pub priority: Priority,
    /// When the item was inserted into the queue. Stamped at enqueue.
    pub enqueued_at: DateTime<Utc>,
    /// Optional wall-clock bound the executing worker applies to the
    /// operation. An elapsed timeout is reported as an operation failure.
    pub timeout: Option<Duration>,
    /// The deferred computation to run.
    pub operation: Operation,
}

impl WorkItem {
    /// Create a new work item with default priority and no timeout.
    pub fn new(job_type: impl Into<String>, operation: Operation) -> Self {
        Self {
            id: TaskId::new(),
            job_type: job_type.into(),
            priority: Priority::default(),
            enqueued_at: Utc::now(),
            timeout: None,
            operation,
        }
    }

    /// Set the priority for this item.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the execution timeout for this item.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
