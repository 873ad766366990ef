//! Fixed-period producer for maintenance work items.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use taskmill_core::WorkItem;

use crate::queue::TaskQueue;

/// Enqueues one item per period from a caller-supplied factory, in the
/// manner of a scheduled report or cleanup job.
pub struct ScheduledProducer {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledProducer {
    /// Spawn the producer loop. The first item is produced one full period
    /// after the call.
    pub fn spawn<F>(queue: TaskQueue, period: Duration, make_item: F) -> Self
    where
        F: Fn() -> WorkItem + Send + 'static,
    {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "scheduled producer started");

            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; skip it.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let item = make_item();
                debug!(task = %item.id, job_type = %item.job_type, "enqueueing scheduled task");
                if let Err(error) = queue.enqueue_with_token(item, &token).await {
                    info!(%error, "scheduled producer stopping");
                    break;
                }
            }

            info!("scheduled producer stopped");
        });

        Self { shutdown, handle }
    }

    /// Stop the producer and wait for its loop to exit.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}
