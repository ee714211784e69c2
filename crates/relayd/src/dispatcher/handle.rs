//! Client interface for the dispatcher actor.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `DispatcherError::ChannelClosed`

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use relay_core::ClientId;

use super::commands::{DispatcherCommand, DispatcherError};
use crate::client::{Client, ClientInfo};
use crate::reader::ReaderState;
use crate::stats::{RelayStats, StatsSnapshot};

/// Handle for interacting with the dispatcher actor.
///
/// Cheap to clone; one per connection handler. The actor exits once every
/// clone is dropped.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<DispatcherCommand>,
    reader_state: watch::Receiver<ReaderState>,
    stats: Arc<RelayStats>,
}

impl DispatcherHandle {
    pub fn new(
        sender: mpsc::Sender<DispatcherCommand>,
        reader_state: watch::Receiver<ReaderState>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            sender,
            reader_state,
            stats,
        }
    }

    /// Admit a client. Its queue starts receiving frames from the next read.
    ///
    /// # Errors
    ///
    /// - `DispatcherError::AlreadyAdmitted` if the id is already registered
    /// - `DispatcherError::ChannelClosed` if the actor has shut down
    pub async fn admit(&self, client: Client) -> Result<(), DispatcherError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(DispatcherCommand::Admit {
                client,
                respond_to: tx,
            })
            .await
            .map_err(|_| DispatcherError::ChannelClosed)?;

        rx.await.map_err(|_| DispatcherError::ChannelClosed)?
    }

    /// Remove a client. Its queue receives nothing further.
    ///
    /// # Errors
    ///
    /// - `DispatcherError::ClientNotFound` if the id is not registered
    /// - `DispatcherError::ChannelClosed` if the actor has shut down
    pub async fn remove(&self, client_id: ClientId) -> Result<(), DispatcherError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(DispatcherCommand::Remove {
                client_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| DispatcherError::ChannelClosed)?;

        rx.await.map_err(|_| DispatcherError::ChannelClosed)?
    }

    /// Number of registered clients. Returns 0 if the actor is gone.
    pub async fn client_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(DispatcherCommand::ClientCount { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Registered clients, oldest first. Empty if the actor is gone.
    pub async fn list_clients(&self) -> Vec<ClientInfo> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(DispatcherCommand::ListClients { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Current broadcast reader state.
    pub fn reader_state(&self) -> ReaderState {
        *self.reader_state.borrow()
    }

    /// Receiver that observes every reader state change.
    pub fn watch_reader_state(&self) -> watch::Receiver<ReaderState> {
        self.reader_state.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
