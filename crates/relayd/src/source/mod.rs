//! Upstream source adapters.
//!
//! A `FrameSource` hides how frames are produced behind two calls:
//! `initialize` (connect, callable again after any failure) and
//! `read_message` (next frame or an error). Sources never retry
//! internally; the broadcast reader owns retry and backoff.
//!
//! # Cancel Safety
//!
//! The reader races both calls against its quit signal, so implementations
//! must be cancel safe: dropping an in-flight `read_message` must not lose a
//! frame that a later call would have returned, and dropping an in-flight
//! `initialize` must leave the source Disconnected.

#[cfg(test)]
pub(crate) mod mock;
mod synthetic;
mod tcp;

pub use synthetic::SyntheticSource;
pub use tcp::TcpFrameSource;

use std::future::Future;
use std::time::Duration;

use relay_core::Frame;
use relay_protocol::ProtocolError;
use thiserror::Error;

/// Connection state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// The upstream producer of frames.
pub trait FrameSource: Send + 'static {
    /// Establishes (or re-establishes) the upstream session.
    ///
    /// Any previous session is discarded first.
    fn initialize(&mut self) -> impl Future<Output = Result<(), ConnectError>> + Send;

    /// Returns the next frame.
    ///
    /// Any error leaves the source Disconnected until the next successful
    /// `initialize`.
    fn read_message(&mut self) -> impl Future<Output = Result<Frame, ReadError>> + Send;

    /// Current session state.
    fn session_state(&self) -> SessionState;
}

/// The upstream session could not be established.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Failed to connect to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out connecting to {addr} after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// The upstream session was lost while reading.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Source is not connected")]
    NotConnected,

    #[error("Read timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream closed the stream")]
    Closed,

    #[error("Frame too large: {len} bytes (max: {max} exclusive)")]
    FrameTooLarge { len: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for ReadError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::FrameTooLarge { len, max } => ReadError::FrameTooLarge { len, max },
            ProtocolError::Io(e) => ReadError::Io(e),
            other => ReadError::Protocol(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_protocol_error_maps_to_frame_too_large() {
        let err = ReadError::from(ProtocolError::FrameTooLarge {
            len: 20_000,
            max: 20_000,
        });
        assert!(matches!(
            err,
            ReadError::FrameTooLarge {
                len: 20_000,
                max: 20_000
            }
        ));
        assert!(err.to_string().contains("20000"));
    }

    #[test]
    fn test_truncated_maps_to_protocol() {
        let err = ReadError::from(ProtocolError::Truncated { buffered: 3 });
        assert!(matches!(err, ReadError::Protocol(_)));
    }
}
