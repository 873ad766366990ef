//! Integration tests for the auxiliary producers.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use taskmill_engine::{
    FileMonitor, FileMonitorConfig, FileProcessor, Operation, OperationFuture, PoolConfig,
    Priority, ProcessorRegistry, QueueConfig, ScheduledProducer, TaskPool, TaskQueue, WorkItem,
};

/// Poll `condition` every 10ms until it holds, panicking after `deadline`.
async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) {
    let started = Instant::now();
    while !condition() {
        if started.elapsed() > deadline {
            panic!("condition not reached within {:?}", deadline);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Records every path it is asked to process.
struct RecordingProcessor {
    extension: &'static str,
    processed: Arc<Mutex<Vec<PathBuf>>>,
}

impl FileProcessor for RecordingProcessor {
    fn extension(&self) -> &str {
        self.extension
    }

    fn job_type(&self) -> &str {
        "text-file"
    }

    fn process(&self, path: PathBuf, _token: CancellationToken) -> OperationFuture {
        let processed = self.processed.clone();
        Box::pin(async move {
            processed.lock().unwrap().push(path);
            Ok(())
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_monitor_enqueues_each_new_file_once() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
    std::fs::write(dir.path().join("skip.bin"), [0u8; 4]).unwrap();

    let processed: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry.register(RecordingProcessor {
        extension: "txt",
        processed: processed.clone(),
    });

    let queue = TaskQueue::open(QueueConfig::new(16)).await.unwrap();
    let pool = TaskPool::start(queue.clone(), PoolConfig::new(2));
    let monitor = FileMonitor::spawn(
        queue.clone(),
        Arc::new(registry),
        FileMonitorConfig::new(dir.path())
            .with_poll_interval(Duration::from_millis(25))
            .with_priority(Priority::HIGH),
    );

    // Files present at startup are picked up on the first scan; the .bin
    // file has no processor and is skipped.
    wait_until(Duration::from_secs(2), || processed.lock().unwrap().len() == 2).await;

    // A file appearing later is picked up exactly once.
    std::fs::write(dir.path().join("c.txt"), "gamma").unwrap();
    wait_until(Duration::from_secs(2), || processed.lock().unwrap().len() == 3).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(processed.lock().unwrap().len(), 3, "file reprocessed");

    monitor.stop().await;
    queue.close();
    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scheduled_producer_enqueues_periodically() {
    let queue = TaskQueue::open(QueueConfig::new(16)).await.unwrap();
    let pool = TaskPool::start(queue.clone(), PoolConfig::new(1));

    let producer = ScheduledProducer::spawn(queue.clone(), Duration::from_millis(30), || {
        WorkItem::new(
            "cleanup",
            Operation::new(|_token| Box::pin(async { Ok(()) })),
        )
    });

    wait_until(Duration::from_secs(2), || pool.stats().completed >= 3).await;
    assert_eq!(pool.stats().failed, 0);

    producer.stop().await;
    queue.close();
    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn producers_stop_when_queue_closes() {
    let queue = TaskQueue::open(QueueConfig::new(4)).await.unwrap();

    let producer = ScheduledProducer::spawn(queue.clone(), Duration::from_millis(20), || {
        WorkItem::new(
            "cleanup",
            Operation::new(|_token| Box::pin(async { Ok(()) })),
        )
    });

    queue.close();

    // The producer notices the closed queue on its next tick and exits on
    // its own; stop() then returns promptly.
    tokio::time::sleep(Duration::from_millis(60)).await;
    tokio::time::timeout(Duration::from_secs(1), producer.stop())
        .await
        .unwrap();
}
