//! Integration tests for the bounded priority queue.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskmill_engine::{
    DequeueError, EnqueueError, Operation, Priority, QueueConfig, TaskEvent, TaskId, TaskQueue,
    TryEnqueueError, WorkItem,
};

fn item(job_type: &str, priority: u8) -> WorkItem {
    WorkItem::new(job_type, Operation::new(|_token| Box::pin(async { Ok(()) })))
        .with_priority(Priority(priority))
}

#[tokio::test]
async fn dequeue_respects_priority_then_fifo() {
    let queue = TaskQueue::open(QueueConfig::new(16)).await.unwrap();
    let token = CancellationToken::new();

    let mut ids = Vec::new();
    for priority in [1u8, 5, 3, 5, 1] {
        let item = item("load", priority);
        ids.push(item.id);
        queue.enqueue(item).await.unwrap();
    }

    let mut order = Vec::new();
    for _ in 0..5 {
        order.push(queue.dequeue(&token).await.unwrap().id);
    }

    // Both priority-5 items first in enqueue order, then 3, then both 1s.
    assert_eq!(order, vec![ids[1], ids[3], ids[2], ids[0], ids[4]]);
}

#[tokio::test]
async fn full_queue_blocks_enqueue_until_space_frees() {
    let queue = TaskQueue::open(QueueConfig::new(2)).await.unwrap();
    let token = CancellationToken::new();

    let a = item("load", 1);
    let a_id = a.id;
    queue.enqueue(a).await.unwrap();
    let b = item("load", 5);
    let b_id = b.id;
    queue.enqueue(b).await.unwrap();

    // Third enqueue must suspend, not error and not drop.
    let c = item("load", 3);
    let c_id = c.id;
    let blocked = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.enqueue(c).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!blocked.is_finished());
    assert_eq!(queue.count(), 2);

    // Dequeue frees space: B (priority 5) comes out first and the blocked
    // producer completes.
    assert_eq!(queue.dequeue(&token).await.unwrap().id, b_id);
    blocked.await.unwrap().unwrap();

    // C (priority 3) beats A (priority 1).
    assert_eq!(queue.dequeue(&token).await.unwrap().id, c_id);
    assert_eq!(queue.dequeue(&token).await.unwrap().id, a_id);
}

#[tokio::test]
async fn empty_queue_blocks_dequeue_until_item_arrives() {
    let queue = TaskQueue::open(QueueConfig::new(4)).await.unwrap();
    let token = CancellationToken::new();

    let consumer = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dequeue(&token).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!consumer.is_finished());

    let sent = item("load", 1);
    let sent_id = sent.id;
    queue.enqueue(sent).await.unwrap();

    let received = consumer.await.unwrap().unwrap();
    assert_eq!(received.id, sent_id);
}

#[tokio::test]
async fn dequeue_returns_cancelled_when_token_fires() {
    let queue = TaskQueue::open(QueueConfig::new(4)).await.unwrap();
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(1), queue.dequeue(&token)).await;
    assert!(matches!(result.unwrap(), Err(DequeueError::Cancelled)));
}

#[tokio::test]
async fn blocked_enqueue_returns_cancelled_when_token_fires() {
    let queue = TaskQueue::open(QueueConfig::new(1)).await.unwrap();
    queue.enqueue(item("load", 1)).await.unwrap();

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = queue.enqueue_with_token(item("load", 1), &token).await;
    assert_eq!(result, Err(EnqueueError::Cancelled));
    assert_eq!(queue.count(), 1);
}

#[tokio::test]
async fn try_enqueue_surfaces_backpressure() {
    let queue = TaskQueue::open(QueueConfig::new(1)).await.unwrap();

    queue.try_enqueue(item("load", 1)).await.unwrap();
    assert_eq!(
        queue.try_enqueue(item("load", 1)).await,
        Err(TryEnqueueError::Full)
    );
}

#[tokio::test]
async fn close_rejects_enqueues_but_drains_queued_items() {
    let queue = TaskQueue::open(QueueConfig::new(4)).await.unwrap();
    let token = CancellationToken::new();

    queue.enqueue(item("load", 2)).await.unwrap();
    queue.enqueue(item("load", 1)).await.unwrap();

    queue.close();
    assert!(queue.is_closed());
    assert_eq!(queue.enqueue(item("load", 1)).await, Err(EnqueueError::Closed));
    assert_eq!(
        queue.try_enqueue(item("load", 1)).await,
        Err(TryEnqueueError::Closed)
    );

    // Items enqueued before close are still deliverable.
    assert!(queue.dequeue(&token).await.is_ok());
    assert!(queue.dequeue(&token).await.is_ok());

    // Drained: dequeue now reports closed.
    assert!(matches!(
        queue.dequeue(&token).await,
        Err(DequeueError::Closed)
    ));
}

#[tokio::test]
async fn close_wakes_blocked_producer() {
    let queue = TaskQueue::open(QueueConfig::new(1)).await.unwrap();
    queue.enqueue(item("load", 1)).await.unwrap();

    let blocked_producer = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.enqueue(item("load", 1)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!blocked_producer.is_finished());

    queue.close();
    assert_eq!(blocked_producer.await.unwrap(), Err(EnqueueError::Closed));
}

#[tokio::test]
async fn close_wakes_parked_consumer() {
    let queue = TaskQueue::open(QueueConfig::new(1)).await.unwrap();

    let parked_consumer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            let token = CancellationToken::new();
            queue.dequeue(&token).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!parked_consumer.is_finished());

    queue.close();
    assert!(matches!(
        parked_consumer.await.unwrap(),
        Err(DequeueError::Closed)
    ));
}

#[tokio::test]
async fn count_tracks_depth() {
    let queue = TaskQueue::open(QueueConfig::new(8)).await.unwrap();
    let token = CancellationToken::new();

    assert_eq!(queue.count(), 0);
    for _ in 0..3 {
        queue.enqueue(item("load", 1)).await.unwrap();
    }
    assert_eq!(queue.count(), 3);

    queue.dequeue(&token).await.unwrap();
    assert_eq!(queue.count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_loss_no_duplication_under_concurrency() {
    const PRODUCERS: usize = 3;
    const ITEMS_PER_PRODUCER: usize = 30;

    let queue = TaskQueue::open(QueueConfig::new(8)).await.unwrap();
    let delivered: Arc<Mutex<Vec<TaskId>>> = Arc::new(Mutex::new(Vec::new()));
    let enqueued: Arc<Mutex<Vec<TaskId>>> = Arc::new(Mutex::new(Vec::new()));

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            let delivered = delivered.clone();
            tokio::spawn(async move {
                let token = CancellationToken::new();
                while let Ok(item) = queue.dequeue(&token).await {
                    delivered.lock().unwrap().push(item.id);
                }
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|n| {
            let queue = queue.clone();
            let enqueued = enqueued.clone();
            tokio::spawn(async move {
                for i in 0..ITEMS_PER_PRODUCER {
                    let item = item("load", ((n + i) % 4) as u8);
                    enqueued.lock().unwrap().push(item.id);
                    queue.enqueue(item).await.unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.await.unwrap();
    }
    queue.close();
    for consumer in consumers {
        consumer.await.unwrap();
    }

    let delivered = delivered.lock().unwrap();
    let expected: HashSet<TaskId> = enqueued.lock().unwrap().iter().copied().collect();
    let unique: HashSet<TaskId> = delivered.iter().copied().collect();

    assert_eq!(delivered.len(), PRODUCERS * ITEMS_PER_PRODUCER);
    assert_eq!(unique.len(), delivered.len(), "duplicate delivery");
    assert_eq!(unique, expected, "lost or fabricated items");
}

#[tokio::test]
async fn events_report_enqueue_and_close() {
    let queue = TaskQueue::open(QueueConfig::new(4)).await.unwrap();
    let mut events = queue.subscribe();

    let sent = item("report", 7);
    let sent_id = sent.id;
    queue.enqueue(sent).await.unwrap();
    queue.close();

    let first = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    match first {
        TaskEvent::TaskEnqueued {
            task_id,
            job_type,
            priority,
            ..
        } => {
            assert_eq!(task_id, sent_id);
            assert_eq!(job_type, "report");
            assert_eq!(priority, Priority(7));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let second = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(second, TaskEvent::QueueClosed { .. }));
}
