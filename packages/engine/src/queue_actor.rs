//! Queue actor: the single owner of all queue state.
//!
//! All heap mutation is serialized through the actor's mailbox. Producers
//! suspend on the capacity semaphore before their message reaches the actor;
//! consumers suspend on a parked reply channel when the queue is empty.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tokio::sync::{Semaphore, broadcast};
use tracing::debug;

use taskmill_core::{TaskEvent, WorkItem};

use crate::messages::{DequeueReply, QueueMessage};
use crate::queue::{DequeueError, EnqueueError};

/// Heap entry: higher priority first, then lower sequence number (FIFO
/// within a priority level).
#[derive(Debug)]
struct PrioritizedItem {
    item: WorkItem,
    sequence: u64,
}

impl PartialEq for PrioritizedItem {
    fn eq(&self, other: &Self) -> bool {
        self.item.priority == other.item.priority && self.sequence == other.sequence
    }
}

impl Eq for PrioritizedItem {}

impl PartialOrd for PrioritizedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.item.priority.cmp(&other.item.priority) {
            // BinaryHeap is a max-heap; reverse the sequence comparison so
            // the oldest entry wins among equal priorities.
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

/// State for the queue actor.
pub(crate) struct QueueActorState {
    heap: BinaryHeap<PrioritizedItem>,
    /// Consumers parked while the queue is empty, in arrival order.
    /// Invariant: non-empty only when the heap is empty.
    waiters: VecDeque<DequeueReply>,
    closed: bool,
    next_sequence: u64,
    /// Depth mirror read by `TaskQueue::count` without touching the mailbox.
    depth: Arc<AtomicUsize>,
    /// Capacity gate shared with producers. Permits return here when items
    /// leave the queue.
    capacity: Arc<Semaphore>,
    events: broadcast::Sender<TaskEvent>,
}

impl QueueActorState {
    pub(crate) fn new(
        depth: Arc<AtomicUsize>,
        capacity: Arc<Semaphore>,
        events: broadcast::Sender<TaskEvent>,
    ) -> Self {
        Self {
            heap: BinaryHeap::new(),
            waiters: VecDeque::new(),
            closed: false,
            next_sequence: 0,
            depth,
            capacity,
            events,
        }
    }

    fn broadcast(&self, event: TaskEvent) {
        let _ = self.events.send(event);
    }

    fn handle_enqueue(&mut self, item: WorkItem, reply: RpcReplyPort<Result<(), EnqueueError>>) {
        if self.closed {
            let _ = reply.send(Err(EnqueueError::Closed));
            return;
        }

        let mut item = item;
        item.enqueued_at = Utc::now();

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.broadcast(TaskEvent::TaskEnqueued {
            task_id: item.id,
            job_type: item.job_type.clone(),
            priority: item.priority,
            timestamp: item.enqueued_at,
        });
        let _ = reply.send(Ok(()));

        self.deliver_or_hold(item, sequence);
    }

    /// Hand the item to a parked consumer if one is still listening,
    /// otherwise hold it in the heap.
    fn deliver_or_hold(&mut self, item: WorkItem, sequence: u64) {
        let mut item = item;
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.send(Ok(Box::new(item))) {
                Ok(()) => {
                    // Handed over without ever occupying the queue; the
                    // producer's permit frees immediately.
                    self.capacity.add_permits(1);
                    return;
                }
                // The consumer cancelled after parking; reclaim the item
                // and try the next waiter.
                Err(Ok(returned)) => item = *returned,
                Err(Err(_)) => return,
            }
        }

        self.heap.push(PrioritizedItem { item, sequence });
        self.depth.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn handle_dequeue(&mut self, reply: DequeueReply) {
        let Some(PrioritizedItem { item, sequence }) = self.heap.pop() else {
            if self.closed {
                let _ = reply.send(Err(DequeueError::Closed));
            } else {
                self.waiters.push_back(reply);
            }
            return;
        };

        match reply.send(Ok(Box::new(item))) {
            Ok(()) => {
                self.depth.fetch_sub(1, AtomicOrdering::Relaxed);
                self.capacity.add_permits(1);
            }
            // The consumer cancelled between requesting and receiving; the
            // item keeps its place in the order.
            Err(Ok(returned)) => {
                self.heap.push(PrioritizedItem {
                    item: *returned,
                    sequence,
                });
            }
            Err(Err(_)) => {}
        }
    }

    fn handle_close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.capacity.close();

        debug!(remaining = self.heap.len(), "task queue closed");

        // Parked consumers exist only when the heap is empty, so there is
        // nothing left for them to drain.
        while let Some(waiter) = self.waiters.pop_front() {
            let _ = waiter.send(Err(DequeueError::Closed));
        }

        self.broadcast(TaskEvent::QueueClosed {
            timestamp: Utc::now(),
        });
    }

    /// After close, the actor lingers only while items remain to drain.
    fn drained(&self) -> bool {
        self.closed && self.heap.is_empty() && self.waiters.is_empty()
    }
}

/// Queue actor processing enqueue/dequeue/close messages.
pub(crate) struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueActorState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(args)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Enqueue { item, reply } => state.handle_enqueue(*item, reply),
            QueueMessage::Dequeue { reply } => state.handle_dequeue(reply),
            QueueMessage::Close => state.handle_close(),
        }

        if state.drained() {
            myself.stop(None);
        }

        Ok(())
    }
}
