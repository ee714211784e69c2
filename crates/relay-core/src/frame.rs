//! The unit of the relayed stream.

use std::fmt;

use bytes::Bytes;

/// One opaque unit of the relayed binary stream.
///
/// The core never looks inside a frame. Cloning is cheap: the payload is a
/// reference-counted `Bytes`, so fanning a frame out to many client queues
/// shares one allocation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame(Bytes);

impl Frame {
    /// Wraps an existing buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Creates a frame that borrows static data.
    pub const fn from_static(data: &'static [u8]) -> Self {
        Self(Bytes::from_static(data))
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a zero-length frame.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for Frame {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Payloads can be large; show the length rather than the bytes.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").field("len", &self.0.len()).finish()
    }
}
