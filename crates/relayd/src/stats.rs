//! Relay counters.
//!
//! Updated with relaxed atomics from the reader and dispatcher; read as a
//! point-in-time snapshot for logging and tests.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RelayStats {
    frames_read: AtomicU64,
    frames_queued: AtomicU64,
    frames_dropped: AtomicU64,
    reconnects: AtomicU64,
    clients_admitted: AtomicU64,
    clients_removed: AtomicU64,
}

/// Copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames read from the upstream and offered to clients (header excluded)
    pub frames_read: u64,
    /// Per-client enqueues that succeeded
    pub frames_queued: u64,
    /// Per-client enqueues discarded because the queue was full
    pub frames_dropped: u64,
    /// Successful upstream re-initializations
    pub reconnects: u64,
    pub clients_admitted: u64,
    pub clients_removed: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.frames_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admitted(&self) {
        self.clients_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self) {
        self.clients_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_read: self.frames_read.load(Ordering::Relaxed),
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            clients_admitted: self.clients_admitted.load(Ordering::Relaxed),
            clients_removed: self.clients_removed.load(Ordering::Relaxed),
        }
    }
}
