//! Per-consumer connection handler.
//!
//! Each consumer connection gets its own `ConnectionHandler` that:
//! - Admits itself to the dispatcher
//! - Writes the cached stream header
//! - Drains its queue to the consumer, one deadline per write
//! - Removes itself on every exit path
//!
//! Whatever ends the stream (write error, stalled consumer, consumer hang
//! up, shutdown) only ever affects this one client.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in removal

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use relay_core::{ClientId, Frame};
use relay_protocol::{FrameCodec, FrameWriter, ProtocolError};

use crate::dispatcher::DispatcherError;
use crate::queue::QueueReceiver;
use crate::relay::Relay;

/// Inbound bytes are drained and discarded in chunks of this size.
const INBOUND_CHUNK: usize = 512;

/// What woke the streaming loop.
enum StreamEvent {
    Frame(Frame),
    QueueClosed,
    /// Consumer sent bytes; nothing is expected from it
    Inbound,
    PeerClosed,
    PeerError(std::io::Error),
    Shutdown,
}

/// Handler for a single consumer connection.
pub struct ConnectionHandler<R, W> {
    /// Read half; only watched for hang-up
    reader: R,
    writer: FrameWriter<W>,
    peer: Option<SocketAddr>,
    relay: Relay,
}

impl<R, W> ConnectionHandler<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, peer: Option<SocketAddr>, relay: Relay) -> Self {
        let codec = FrameCodec::new(relay.config().max_frame_len);
        Self {
            reader,
            writer: FrameWriter::new(writer, codec),
            peer,
            relay,
        }
    }

    /// Runs the connection to completion.
    ///
    /// Returns `Ok` when the consumer hung up or the relay shut down, and
    /// the reason otherwise. Once admitted, the client is always removed
    /// before this returns.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let (client, mut queue) = self.relay.new_client(self.peer);
        let client_id = client.id;

        self.relay.dispatcher().admit(client).await?;

        let result = self.stream(client_id, &mut queue).await;

        if let Err(e) = self.relay.dispatcher().remove(client_id).await {
            warn!(client_id = %client_id, error = %e, "Failed to remove client");
        }

        match &result {
            Ok(()) => info!(client_id = %client_id, "Client disconnected"),
            Err(e) => info!(client_id = %client_id, reason = %e, "Client dropped"),
        }
        result
    }

    async fn stream(
        &mut self,
        client_id: ClientId,
        queue: &mut QueueReceiver,
    ) -> Result<(), ConnectionError> {
        let header = self.relay.header().get().ok_or(ConnectionError::NoHeader)?;
        self.write(&header).await?;
        debug!(client_id = %client_id, len = header.len(), "Header written");

        let shutdown = self.relay.shutdown_token().clone();
        let mut scratch = [0u8; INBOUND_CHUNK];

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => StreamEvent::Shutdown,
                frame = queue.next() => match frame {
                    Some(frame) => StreamEvent::Frame(frame),
                    None => StreamEvent::QueueClosed,
                },
                read = self.reader.read(&mut scratch) => match read {
                    Ok(0) => StreamEvent::PeerClosed,
                    Ok(_) => StreamEvent::Inbound,
                    Err(e) => StreamEvent::PeerError(e),
                },
            };

            match event {
                StreamEvent::Frame(frame) => self.write(&frame).await?,
                StreamEvent::Inbound => {}
                StreamEvent::PeerClosed => return Ok(()),
                StreamEvent::PeerError(e) => return Err(ConnectionError::Io(e)),
                StreamEvent::QueueClosed => return Err(ConnectionError::QueueClosed),
                StreamEvent::Shutdown => {
                    let _ = self.writer.shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    /// Writes one frame under the client write deadline.
    async fn write(&mut self, frame: &Frame) -> Result<(), ConnectionError> {
        let deadline = self.relay.config().client_write_timeout();

        match timeout(deadline, self.writer.write_frame(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::from(e)),
            Err(_) => Err(ConnectionError::WriteTimeout(deadline)),
        }
    }
}

/// Errors that end a single consumer connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Admission failed: {0}")]
    Admit(#[from] DispatcherError),

    #[error("No stream header captured")]
    NoHeader,

    #[error("Client queue closed")]
    QueueClosed,
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => ConnectionError::Io(e),
            other => ConnectionError::Protocol(other),
        }
    }
}
