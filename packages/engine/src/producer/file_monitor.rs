//! Directory watcher producing one work item per newly observed file.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskmill_core::{Operation, Priority, WorkItem};

use crate::processor::ProcessorRegistry;
use crate::queue::{EnqueueError, TaskQueue};

/// Configuration for a [`FileMonitor`].
#[derive(Debug, Clone)]
pub struct FileMonitorConfig {
    /// Directory to watch.
    pub watch_dir: PathBuf,
    /// How often to scan for new files.
    pub poll_interval: Duration,
    /// Priority assigned to produced items.
    pub priority: Priority,
}

impl FileMonitorConfig {
    pub fn new(watch_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            poll_interval: Duration::from_secs(5),
            priority: Priority::NORMAL,
        }
    }

    /// Set the scan interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the priority for produced items.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Watches a directory and enqueues one item per new file, routed through
/// the processor registry by extension.
///
/// Files already present at startup are treated as new on the first scan.
/// Files with no registered processor are skipped. The monitor applies the
/// queue's backpressure: a full queue delays the scan rather than dropping
/// files.
pub struct FileMonitor {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl FileMonitor {
    /// Spawn the monitor loop.
    pub fn spawn(
        queue: TaskQueue,
        processors: Arc<ProcessorRegistry>,
        config: FileMonitorConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(run(queue, processors, config, token));
        Self { shutdown, handle }
    }

    /// Stop the monitor and wait for its loop to exit.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

async fn run(
    queue: TaskQueue,
    processors: Arc<ProcessorRegistry>,
    config: FileMonitorConfig,
    shutdown: CancellationToken,
) {
    info!(dir = %config.watch_dir.display(), "file monitor started");

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut interval = tokio::time::interval(config.poll_interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        if let Err(error) = scan(&queue, &processors, &config, &mut seen, &shutdown).await {
            info!(%error, "file monitor stopping");
            break;
        }
    }

    info!("file monitor stopped");
}

async fn scan(
    queue: &TaskQueue,
    processors: &ProcessorRegistry,
    config: &FileMonitorConfig,
    seen: &mut HashSet<PathBuf>,
    shutdown: &CancellationToken,
) -> Result<(), EnqueueError> {
    let mut entries = match tokio::fs::read_dir(&config.watch_dir).await {
        Ok(entries) => entries,
        Err(error) => {
            warn!(dir = %config.watch_dir.display(), %error, "failed to read watch directory");
            return Ok(());
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if seen.contains(&path) {
            continue;
        }
        let is_file = entry
            .file_type()
            .await
            .map(|file_type| file_type.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        seen.insert(path.clone());

        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let Some(processor) = processors.get(extension) else {
            debug!(path = %path.display(), "no processor for extension");
            continue;
        };

        let job_type = processor.job_type().to_string();
        let file_path = path.clone();
        let item = WorkItem::new(
            job_type,
            Operation::new(move |token| processor.process(file_path, token)),
        )
        .with_priority(config.priority);

        debug!(path = %path.display(), task = %item.id, "enqueueing file task");
        queue.enqueue_with_token(item, shutdown).await?;
    }

    Ok(())
}
