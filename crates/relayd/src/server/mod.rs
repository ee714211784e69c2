//! TCP server for downstream consumers.
//!
//! The server:
//! - Listens on a TCP socket for consumer connections
//! - Spawns a `ConnectionHandler` for each consumer
//! - Supports graceful shutdown via the relay's `CancellationToken`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ConnectionHandler│────▶│ DispatcherHandle │
//! │  (per consumer) │     │                  │
//! └─────────────────┘     └──────────────────┘
//!         ▲
//!         │ QueueReceiver
//! ┌─────────────────┐
//! │ BroadcastReader │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the loop keeps going

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::relay::Relay;

/// Accepts consumers and hands each one to its own `ConnectionHandler`.
pub struct RelayServer {
    listen: SocketAddr,
    relay: Relay,
    cancel_token: CancellationToken,
}

impl RelayServer {
    /// Creates a server that stops when the relay shuts down.
    pub fn new(listen: SocketAddr, relay: Relay) -> Self {
        let cancel_token = relay.shutdown_token().clone();
        Self {
            listen,
            relay,
            cancel_token,
        }
    }

    /// Binds the listen address and serves until cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.listen)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.listen,
                source,
            })?;

        self.serve(listener).await
    }

    /// Serves on an already bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr().unwrap_or(self.listen);
        info!(listen = %local, "Relay server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let handler = ConnectionHandler::new(reader, writer, Some(peer), self.relay.clone());

        tokio::spawn(async move {
            if let Err(e) = handler.run().await {
                debug!(peer = %peer, error = %e, "Connection ended");
            }
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
