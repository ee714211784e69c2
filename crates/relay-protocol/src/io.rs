//! Async frame reader and writer over any tokio byte stream.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use relay_core::Frame;

use crate::codec::FrameCodec;
use crate::error::ProtocolError;

/// Initial receive buffer size.
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads length-prefixed frames from an `AsyncRead`.
///
/// Bytes read past the end of one frame stay buffered for the next call.
/// If a read is abandoned (e.g. by a timeout) any partially received frame
/// is kept, so callers that give up on a stream should drop the reader.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    codec: FrameCodec,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, codec: FrameCodec) -> Self {
        Self {
            inner,
            codec,
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
        }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` on a clean end of stream (EOF on a frame boundary).
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(frame));
            }

            if self.inner.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError::Truncated {
                    buffered: self.buffer.len(),
                });
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes length-prefixed frames to an `AsyncWrite`, flushing after each.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    codec: FrameCodec,
    buffer: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W, codec: FrameCodec) -> Self {
        Self {
            inner,
            codec,
            buffer: BytesMut::new(),
        }
    }

    /// Encodes and writes one frame, then flushes.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        self.buffer.clear();
        self.codec.encode(frame.clone(), &mut self.buffer)?;
        self.inner.write_all(&self.buffer).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
