//! The broadcast domain.
//!
//! A `Relay` ties one upstream source to one header cache, one dispatcher
//! and one shutdown token. Several relays can coexist in a process; nothing
//! here is global.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_core::{ClientId, RelayConfig};

use crate::client::Client;
use crate::dispatcher::{spawn_dispatcher, DispatcherHandle};
use crate::header::HeaderCache;
use crate::queue::QueueReceiver;
use crate::source::{ConnectError, FrameSource, ReadError};

/// Startup failures. Both are fatal: without a header there is nothing to
/// serve.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Initial upstream connect failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("Failed to read stream header: {0}")]
    HeaderRead(#[from] ReadError),
}

/// Handle to a running broadcast domain. Cheap to clone.
#[derive(Clone)]
pub struct Relay {
    header: HeaderCache,
    dispatcher: DispatcherHandle,
    config: Arc<RelayConfig>,
    shutdown: CancellationToken,
}

impl Relay {
    /// Connects `source`, reads the stream header and spawns the dispatcher.
    ///
    /// The reader stays stopped until the first client is admitted.
    /// Cancelling `shutdown` stops the reader and any server using this
    /// relay.
    ///
    /// # Errors
    ///
    /// - `RelayError::Connect` if the first `initialize` fails
    /// - `RelayError::HeaderRead` if the first read fails
    pub async fn start<S: FrameSource>(
        mut source: S,
        config: RelayConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, RelayError> {
        source.initialize().await?;
        let first = source.read_message().await?;

        let header = HeaderCache::new();
        info!(len = first.len(), "Stream header captured");
        header.capture(first);

        let dispatcher = spawn_dispatcher(source, &config, shutdown.clone());

        Ok(Self {
            header,
            dispatcher,
            config: Arc::new(config),
            shutdown,
        })
    }

    /// A fresh client registration with a queue sized from the config.
    pub fn new_client(&self, peer: Option<SocketAddr>) -> (Client, QueueReceiver) {
        Client::new(ClientId::next(), peer, self.config.queue_capacity)
    }

    pub fn header(&self) -> &HeaderCache {
        &self.header
    }

    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}
