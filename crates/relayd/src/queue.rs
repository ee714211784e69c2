//! Per-client outbound queue.
//!
//! A bounded FIFO between the broadcast reader (producer) and one
//! connection handler (consumer). The producer side never waits: when the
//! queue is full the new frame is discarded for that client only.

use tokio::sync::mpsc::{self, error::TrySendError};

use relay_core::{ClientId, Frame, MAX_QUEUE_CAPACITY};

/// Result of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The frame is queued for delivery
    Queued,
    /// The queue was full; the frame was discarded
    Dropped,
    /// The consumer is gone; the frame was discarded
    Closed,
}

/// Creates a queue for `id` holding at most `capacity` frames.
///
/// `capacity` is clamped to `1..=MAX_QUEUE_CAPACITY`.
pub fn client_queue(id: ClientId, capacity: usize) -> (ClientQueue, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.clamp(1, MAX_QUEUE_CAPACITY));
    (ClientQueue { id, tx }, QueueReceiver { rx })
}

/// Producer side, held in the registry.
#[derive(Debug, Clone)]
pub struct ClientQueue {
    id: ClientId,
    tx: mpsc::Sender<Frame>,
}

impl ClientQueue {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Offers `frame` without waiting.
    pub fn try_enqueue(&self, frame: Frame) -> EnqueueOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(_)) => EnqueueOutcome::Dropped,
            Err(TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer side, owned by the connection handler.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<Frame>,
}

impl QueueReceiver {
    /// Waits for the next frame. `None` once every producer is gone.
    ///
    /// Cancel safe.
    pub async fn next(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Takes a frame if one is ready.
    pub fn try_next(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}
