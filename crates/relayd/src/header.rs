//! Stream header cache.
//!
//! The first frame read after process start describes the stream (for a
//! jsmpeg camera: magic, width, height). Consumers cannot decode anything
//! without it, so it is kept here and written to every consumer before
//! live frames.
//!
//! The header is captured once and never replaced, including after an
//! upstream reconnect.

use std::sync::{Arc, OnceLock};

use relay_core::Frame;

/// Write-once, shared, read-only header slot.
#[derive(Debug, Clone, Default)]
pub struct HeaderCache {
    inner: Arc<OnceLock<Frame>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `frame` if no header has been captured yet.
    ///
    /// Returns true if this call captured the header.
    pub fn capture(&self, frame: Frame) -> bool {
        self.inner.set(frame).is_ok()
    }

    /// The cached header, if captured.
    pub fn get(&self) -> Option<Frame> {
        self.inner.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_capture_wins() {
        let cache = HeaderCache::new();
        assert!(cache.get().is_none());

        assert!(cache.capture(Frame::from_static(b"first")));
        assert!(!cache.capture(Frame::from_static(b"second")));

        assert_eq!(cache.get().unwrap().as_bytes(), b"first");
    }

    #[test]
    fn test_clones_share_slot() {
        let cache = HeaderCache::new();
        let other = cache.clone();

        other.capture(Frame::from_static(b"H"));
        assert_eq!(cache.get().unwrap().as_bytes(), b"H");
    }
}
