//! Broadcast reader loop.
//!
//! Pulls frames from the `FrameSource` and offers each one to every
//! registered client queue. Owns the reconnect state machine:
//!
//! ```text
//!              0→1 clients                 read error
//!   Stopped ───────────────▶ Running ─────────────────▶ Reconnecting
//!      ▲                      │   ▲                          │
//!      │        quit          │   └──── initialize() ok ─────┘
//!      └──────────────────────┘          (fixed delay between
//!      ▲                                  failed attempts)
//!      └────────────────── quit ─────────────────────────────┘
//! ```
//!
//! The dispatcher starts a loop when the first client is admitted and
//! cancels it when the last one leaves. The source sits behind an async
//! mutex held for a loop's whole run, so a new loop cannot read until the
//! previous one has stopped.
//!
//! Fan-out never waits on a client: a full queue loses that frame for that
//! client only.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_core::Frame;

use crate::dispatcher::SharedRegistry;
use crate::queue::EnqueueOutcome;
use crate::source::FrameSource;
use crate::stats::RelayStats;

/// Reader loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Stopped,
    Running,
    Reconnecting,
}

/// Everything a reader loop needs. Cheap to clone; one clone per run.
pub struct BroadcastReader<S> {
    source: Arc<Mutex<S>>,
    registry: SharedRegistry,
    state: Arc<watch::Sender<ReaderState>>,
    stats: Arc<RelayStats>,
    reconnect_delay: Duration,
}

impl<S> Clone for BroadcastReader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            registry: Arc::clone(&self.registry),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            reconnect_delay: self.reconnect_delay,
        }
    }
}

/// Outcome of one reconnect phase.
enum Reconnect {
    Connected,
    Quit,
}

impl<S: FrameSource> BroadcastReader<S> {
    /// Creates a stopped reader and a receiver for its state.
    pub fn new(
        source: S,
        registry: SharedRegistry,
        stats: Arc<RelayStats>,
        reconnect_delay: Duration,
    ) -> (Self, watch::Receiver<ReaderState>) {
        let (state, state_rx) = watch::channel(ReaderState::Stopped);
        let reader = Self {
            source: Arc::new(Mutex::new(source)),
            registry,
            state: Arc::new(state),
            stats,
            reconnect_delay,
        };
        (reader, state_rx)
    }

    /// Marks the reader Running and spawns a loop that runs until `quit`
    /// is cancelled.
    pub fn start(&self, quit: CancellationToken) -> JoinHandle<()> {
        self.set_state(ReaderState::Running);
        tokio::spawn(self.clone().run(quit))
    }

    pub fn state(&self) -> ReaderState {
        *self.state.borrow()
    }

    /// Runs the loop until `quit` is cancelled.
    pub async fn run(self, quit: CancellationToken) {
        // Waits here while a previous loop is still winding down.
        let mut source = tokio::select! {
            biased;
            _ = quit.cancelled() => {
                self.set_state(ReaderState::Stopped);
                return;
            }
            guard = self.source.lock() => guard,
        };

        self.set_state(ReaderState::Running);
        info!("Broadcast reader started");

        // Earliest instant the next initialize() may run.
        let mut next_attempt = Instant::now();

        loop {
            let result = tokio::select! {
                biased;
                _ = quit.cancelled() => break,
                result = source.read_message() => result,
            };

            match result {
                Ok(frame) => self.broadcast(frame).await,
                Err(e) => {
                    debug!(error = %e, "Upstream read failed");
                    self.set_state(ReaderState::Reconnecting);

                    match self.reconnect(&mut *source, &quit, &mut next_attempt).await {
                        Reconnect::Connected => self.set_state(ReaderState::Running),
                        Reconnect::Quit => break,
                    }
                }
            }
        }

        self.set_state(ReaderState::Stopped);
        info!("Broadcast reader stopped");
    }

    /// Offers `frame` to every registered client without waiting.
    async fn broadcast(&self, frame: Frame) {
        self.stats.record_read();

        let clients = self.registry.read().await;
        for queue in clients.values() {
            match queue.try_enqueue(frame.clone()) {
                EnqueueOutcome::Queued => self.stats.record_queued(),
                EnqueueOutcome::Dropped => {
                    self.stats.record_dropped();
                    debug!(
                        client_id = %queue.id(),
                        len = frame.len(),
                        capacity = queue.max_capacity(),
                        "Client queue full, frame dropped"
                    );
                }
                EnqueueOutcome::Closed => {
                    debug!(client_id = %queue.id(), "Client queue closed, frame discarded");
                }
            }
        }
    }

    /// Re-initializes the source until it succeeds or `quit` fires.
    ///
    /// Attempts are spaced at least `reconnect_delay` apart. There is no
    /// attempt limit.
    async fn reconnect(
        &self,
        source: &mut S,
        quit: &CancellationToken,
        next_attempt: &mut Instant,
    ) -> Reconnect {
        let mut attempt: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = quit.cancelled() => return Reconnect::Quit,
                _ = sleep_until(*next_attempt) => {}
            }

            attempt += 1;
            *next_attempt = Instant::now() + self.reconnect_delay;

            let result = tokio::select! {
                biased;
                _ = quit.cancelled() => return Reconnect::Quit,
                result = source.initialize() => result,
            };

            match result {
                Ok(()) => {
                    self.stats.record_reconnect();
                    info!(attempt, "Upstream reconnected");
                    return Reconnect::Connected;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        retry_in = ?self.reconnect_delay,
                        "Upstream reconnect failed"
                    );
                }
            }
        }
    }

    fn set_state(&self, state: ReaderState) {
        self.state.send_replace(state);
    }
}
