//! Dispatcher commands and errors.
//!
//! - `DispatcherCommand`: messages processed one at a time by the actor
//! - `DispatcherError`: failures reported back through `respond_to`

use thiserror::Error;
use tokio::sync::oneshot;

use relay_core::ClientId;

use crate::client::{Client, ClientInfo};

// ============================================================================
// Dispatcher Commands
// ============================================================================

/// Commands sent to the dispatcher actor.
///
/// Each command carries a oneshot channel for the response.
#[derive(Debug)]
pub enum DispatcherCommand {
    /// Add a client to the registry.
    ///
    /// Starts the broadcast reader if this is the first client.
    ///
    /// # Errors
    /// - `DispatcherError::AlreadyAdmitted` if the id is already registered
    Admit {
        client: Client,
        respond_to: oneshot::Sender<Result<(), DispatcherError>>,
    },

    /// Remove a client from the registry.
    ///
    /// Stops the broadcast reader if this was the last client.
    ///
    /// # Errors
    /// - `DispatcherError::ClientNotFound` if the id is not registered
    Remove {
        client_id: ClientId,
        respond_to: oneshot::Sender<Result<(), DispatcherError>>,
    },

    /// Number of registered clients.
    ClientCount { respond_to: oneshot::Sender<usize> },

    /// Registered clients, oldest admission first.
    ListClients {
        respond_to: oneshot::Sender<Vec<ClientInfo>>,
    },
}

// ============================================================================
// Dispatcher Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatcherError {
    #[error("client already admitted: {0}")]
    AlreadyAdmitted(ClientId),

    #[error("client not found: {0}")]
    ClientNotFound(ClientId),

    /// The actor has shut down.
    #[error("dispatcher channel closed")]
    ChannelClosed,
}
