//! Message types for the queue actor.

use ractor::RpcReplyPort;
use tokio::sync::oneshot;

use taskmill_core::WorkItem;

use crate::queue::{DequeueError, EnqueueError};

/// Reply channel for a parked consumer. A plain oneshot sender rather than
/// an [`RpcReplyPort`] because delivery must be recoverable: when a consumer
/// cancels, the failed send returns the item so the actor can re-queue it.
pub(crate) type DequeueReply = oneshot::Sender<Result<Box<WorkItem>, DequeueError>>;

/// Messages for the queue actor.
#[derive(Debug)]
pub(crate) enum QueueMessage {
    /// Insert an item. The producer has already taken a capacity permit.
    Enqueue {
        item: Box<WorkItem>,
        reply: RpcReplyPort<Result<(), EnqueueError>>,
    },

    /// Remove the highest-priority item, parking the reply while empty.
    Dequeue { reply: DequeueReply },

    /// Stop accepting enqueues; drain remaining items, then shut down.
    Close,
}
