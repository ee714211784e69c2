//! Protocol error types.

use thiserror::Error;

/// Errors produced while framing or unframing the byte stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The announced length reached the exclusive maximum
    #[error("Frame too large: {len} bytes (max: {max} exclusive)")]
    FrameTooLarge { len: usize, max: usize },

    /// The peer closed the stream part-way through a frame
    #[error("Stream ended inside a frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },
}
