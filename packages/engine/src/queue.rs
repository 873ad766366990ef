//! Bounded priority queue handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ractor::{Actor, ActorRef, SpawnErr, concurrency};
use tokio::sync::oneshot;
use tokio::sync::{Semaphore, TryAcquireError, broadcast};
use tokio_util::sync::CancellationToken;

use taskmill_core::{QueueConfig, TaskEvent, WorkItem};

use crate::messages::QueueMessage;
use crate::queue_actor::{QueueActor, QueueActorState};

/// Error from a blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    /// The queue has been closed. Permanent; the item was not inserted.
    #[error("queue is closed")]
    Closed,
    /// The caller's cancellation token fired while waiting for space.
    #[error("enqueue was cancelled")]
    Cancelled,
}

/// Error from a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryEnqueueError {
    /// The queue is at capacity. Transient; retry or use the blocking
    /// `enqueue`, which absorbs backpressure as suspension.
    #[error("queue is full")]
    Full,
    /// The queue has been closed. Permanent.
    #[error("queue is closed")]
    Closed,
}

/// Error from a dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DequeueError {
    /// The caller's cancellation token fired while waiting for an item.
    #[error("dequeue was cancelled")]
    Cancelled,
    /// The queue has been closed and fully drained.
    #[error("queue is closed and drained")]
    Closed,
}

/// Clonable handle to a bounded priority task queue.
///
/// Thread-safe: any number of producers and consumers may share clones of
/// one handle. Dequeue order is highest priority first, ties broken by
/// enqueue order (oldest first). A full queue suspends producers; an empty
/// queue suspends consumers. Both suspensions are cooperative.
#[derive(Clone)]
pub struct TaskQueue {
    actor: ActorRef<QueueMessage>,
    capacity: Arc<Semaphore>,
    depth: Arc<AtomicUsize>,
    events: broadcast::Sender<TaskEvent>,
}

impl TaskQueue {
    /// Spawn the queue actor and return a handle to it.
    pub async fn open(config: QueueConfig) -> Result<Self, SpawnErr> {
        let capacity = Arc::new(Semaphore::new(config.capacity));
        let depth = Arc::new(AtomicUsize::new(0));
        let (events, _) = broadcast::channel(config.event_buffer);

        let state = QueueActorState::new(depth.clone(), capacity.clone(), events.clone());
        let (actor, _handle) = Actor::spawn(None, QueueActor, state).await?;

        Ok(Self {
            actor,
            capacity,
            depth,
            events,
        })
    }

    /// Insert an item, suspending while the queue is full.
    pub async fn enqueue(&self, item: WorkItem) -> Result<(), EnqueueError> {
        let permit = self
            .capacity
            .acquire()
            .await
            .map_err(|_| EnqueueError::Closed)?;
        permit.forget();
        self.deliver(item).await
    }

    /// Insert an item, suspending while the queue is full, returning
    /// [`EnqueueError::Cancelled`] if `token` fires first.
    pub async fn enqueue_with_token(
        &self,
        item: WorkItem,
        token: &CancellationToken,
    ) -> Result<(), EnqueueError> {
        let permit = tokio::select! {
            _ = token.cancelled() => return Err(EnqueueError::Cancelled),
            permit = self.capacity.acquire() => permit.map_err(|_| EnqueueError::Closed)?,
        };
        permit.forget();
        self.deliver(item).await
    }

    /// Insert without suspending, surfacing backpressure as
    /// [`TryEnqueueError::Full`].
    pub async fn try_enqueue(&self, item: WorkItem) -> Result<(), TryEnqueueError> {
        match self.capacity.try_acquire() {
            Ok(permit) => permit.forget(),
            Err(TryAcquireError::NoPermits) => return Err(TryEnqueueError::Full),
            Err(TryAcquireError::Closed) => return Err(TryEnqueueError::Closed),
        }
        self.deliver(item).await.map_err(|_| TryEnqueueError::Closed)
    }

    /// Hand an item to the actor. The caller already holds (and forgot) a
    /// capacity permit; the actor releases it when the item leaves.
    async fn deliver(&self, item: WorkItem) -> Result<(), EnqueueError> {
        let (tx, rx) = concurrency::oneshot();
        self.actor
            .send_message(QueueMessage::Enqueue {
                item: Box::new(item),
                reply: tx.into(),
            })
            .map_err(|_| EnqueueError::Closed)?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(EnqueueError::Closed),
        }
    }

    /// Remove and return the highest-priority item, suspending while the
    /// queue is empty.
    ///
    /// Returns [`DequeueError::Cancelled`] when `token` fires, and
    /// [`DequeueError::Closed`] once the queue is closed and drained.
    /// Delivery is exactly-once: an item handed to a consumer that cancelled
    /// in the same instant is reclaimed and keeps its place in the order.
    pub async fn dequeue(&self, token: &CancellationToken) -> Result<WorkItem, DequeueError> {
        let (tx, mut rx) = oneshot::channel();
        self.actor
            .send_message(QueueMessage::Dequeue { reply: tx })
            .map_err(|_| DequeueError::Closed)?;

        tokio::select! {
            _ = token.cancelled() => {
                // Closing the channel first makes the race with the actor
                // atomic: a send that already landed is still retrievable,
                // and one that hasn't fails so the actor re-queues the item.
                rx.close();
                match rx.try_recv() {
                    Ok(result) => result.map(|item| *item),
                    Err(_) => Err(DequeueError::Cancelled),
                }
            }
            reply = &mut rx => match reply {
                Ok(result) => result.map(|item| *item),
                Err(_) => Err(DequeueError::Closed),
            },
        }
    }

    /// Best-effort count of items currently held. Advisory only; never
    /// blocks producers or consumers.
    pub fn count(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.capacity.is_closed()
    }

    /// Close the queue. Idempotent.
    ///
    /// Enqueues observed after this call fail with `Closed`, including
    /// producers already suspended on a full queue. Items already held
    /// remain deliverable to `dequeue` until drained, after which `dequeue`
    /// reports `Closed` and the actor shuts down.
    pub fn close(&self) {
        // Close the semaphore synchronously so enqueues fail
        // deterministically from the moment this call returns.
        self.capacity.close();
        let _ = self.actor.send_message(QueueMessage::Close);
    }

    /// Subscribe to queue and pool events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<TaskEvent> {
        self.events.clone()
    }
}
