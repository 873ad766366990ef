//! Core domain types for the bounded priority task queue.
//!
//! This crate contains the types shared by the runtime and by hosts:
//! - WorkItem, TaskId, Priority and the Operation closure it carries
//! - QueueConfig and PoolConfig
//! - PoolStats snapshots
//! - TaskEvent for real-time observation

mod config;
mod events;
mod stats;
mod task;

pub use config::{PoolConfig, QueueConfig};
pub use events::TaskEvent;
pub use stats::PoolStats;
pub use task::{Operation, OperationError, OperationFuture, Priority, TaskId, WorkItem};
