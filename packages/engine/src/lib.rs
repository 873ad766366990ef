//! Bounded priority task queue with a concurrent worker pool.
//!
//! # Architecture
//!
//! - [`TaskQueue`] - clonable handle over the queue actor. Blocking
//!   `enqueue`/`dequeue` with capacity backpressure; dispatch order is
//!   highest priority first, FIFO within a priority level.
//! - [`TaskPool`] - a fixed set of workers, each looping
//!   dequeue -> execute -> report. Graceful `stop` with a drain timeout.
//! - [`FileMonitor`] / [`ScheduledProducer`] - example producers feeding
//!   the queue from file events and timers.
//!
//! # Usage
//!
//! ```ignore
//! use taskmill_core::{Operation, PoolConfig, QueueConfig, WorkItem};
//! use taskmill_engine::{TaskPool, TaskQueue};
//!
//! let queue = TaskQueue::open(QueueConfig::new(64)).await?;
//! let pool = TaskPool::start(queue.clone(), PoolConfig::new(4));
//!
//! let item = WorkItem::new("report", Operation::new(|_token| {
//!     Box::pin(async { Ok(()) })
//! }));
//! queue.enqueue(item).await?;
//!
//! queue.close();
//! let report = pool.stop().await;
//! ```

mod messages;
mod metrics;
mod pool;
mod processor;
mod producer;
mod queue;
mod queue_actor;
mod worker;

pub use metrics::PoolMetrics;
pub use pool::{AbortedTask, PoolBuilder, StopReport, TaskPool};
pub use processor::{FileProcessor, ProcessorRegistry};
pub use producer::{FileMonitor, FileMonitorConfig, ScheduledProducer};
pub use queue::{DequeueError, EnqueueError, TaskQueue, TryEnqueueError};
pub use worker::FailureCallback;

/// Re-export the core domain types for convenience.
pub use taskmill_core::{
    Operation, OperationError, OperationFuture, PoolConfig, PoolStats, Priority, QueueConfig,
    TaskEvent, TaskId, WorkItem,
};
