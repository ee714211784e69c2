//! `tokio-util` codec for length-prefixed frames.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use relay_core::Frame;

use crate::error::ProtocolError;

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Encodes and decodes `Frame`s as `u32` length + payload.
///
/// `max_frame_len` is exclusive: a frame of exactly that length is rejected.
/// A frame that fills the whole receive buffer means frame sync was lost.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    fn check_len(&self, len: usize) -> Result<(), ProtocolError> {
        if len >= self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(relay_core::DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        let Some(prefix) = src.get(..LENGTH_PREFIX_LEN) else {
            src.reserve(LENGTH_PREFIX_LEN - src.len());
            return Ok(None);
        };

        let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
        len_bytes.copy_from_slice(prefix);
        let len = u32::from_be_bytes(len_bytes) as usize;

        // Reject before buffering the payload.
        self.check_len(len)?;

        let total = LENGTH_PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        Ok(Some(Frame::from(src.split_to(len).freeze())))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        self.check_len(frame.len())?;

        let len = u32::try_from(frame.len()).map_err(|_| ProtocolError::FrameTooLarge {
            len: frame.len(),
            max: self.max_frame_len,
        })?;

        dst.reserve(LENGTH_PREFIX_LEN + frame.len());
        dst.put_u32(len);
        dst.extend_from_slice(frame.as_bytes());
        Ok(())
    }
}
