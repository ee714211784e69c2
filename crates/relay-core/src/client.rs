//! Consumer identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide sequence for client identities.
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one admitted consumer.
///
/// Allocated from a monotonic counter, so an id is never reused while the
/// process runs. A reconnecting consumer gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocates the next unused id.
    pub fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw value. Intended for tests and log correlation.
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}
