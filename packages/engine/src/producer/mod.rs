//! Auxiliary producers: external triggers that feed the queue.
//!
//! Simple callers of `enqueue`; they carry no queue invariants of their
//! own and stop once the queue reports closed.

mod file_monitor;
mod scheduled;

pub use file_monitor::{FileMonitor, FileMonitorConfig};
pub use scheduled::ScheduledProducer;
