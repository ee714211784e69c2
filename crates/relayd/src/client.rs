//! Client registrations.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use relay_core::ClientId;

use crate::queue::{client_queue, ClientQueue, QueueReceiver};

/// One consumer registration, as handed to the dispatcher on admission.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,
    pub peer: Option<SocketAddr>,
    pub queue: ClientQueue,
}

impl Client {
    /// Creates a registration and the receiving end of its queue.
    pub fn new(
        id: ClientId,
        peer: Option<SocketAddr>,
        queue_capacity: usize,
    ) -> (Self, QueueReceiver) {
        let (queue, receiver) = client_queue(id, queue_capacity);
        (Self { id, peer, queue }, receiver)
    }
}

/// Read-only view of a registered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub peer: Option<SocketAddr>,
    pub admitted_at: DateTime<Utc>,
}
