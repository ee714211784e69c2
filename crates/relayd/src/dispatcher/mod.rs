//! Client registry using the actor pattern.
//!
//! The dispatcher is the only writer of the set of admitted clients. It
//! receives commands over an mpsc channel, applies them one at a time, and
//! starts or stops the broadcast reader when occupancy moves between zero
//! and one.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐ Admit/Remove ┌──────────────────┐ start/quit ┌─────────────────┐
//! │ ConnectionHandler │─────────────▶│ DispatcherActor  │───────────▶│ BroadcastReader │
//! └───────────────────┘  (mpsc)      └──────────────────┘            └─────────────────┘
//!          ▲                                  │ write lock                    │ read lock
//!          │ QueueReceiver                    ▼                               ▼
//!          └──────────────────────── HashMap<ClientId, ClientQueue> ◀── try_enqueue
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use relay_core::{ClientId, RelayConfig};

use crate::queue::ClientQueue;
use crate::reader::BroadcastReader;
use crate::source::FrameSource;
use crate::stats::RelayStats;

mod actor;
mod commands;
mod handle;

pub use actor::DispatcherActor;
pub use commands::{DispatcherCommand, DispatcherError};
pub use handle::DispatcherHandle;

/// Registry of client queues: written by the dispatcher, read by the reader.
pub type SharedRegistry = Arc<RwLock<HashMap<ClientId, ClientQueue>>>;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the dispatcher actor and return a handle for interaction.
///
/// This function:
/// 1. Creates the shared registry and the broadcast reader around `source`
/// 2. Spawns the `DispatcherActor` on a tokio task
/// 3. Returns a `DispatcherHandle` for client use
///
/// The reader does not run until the first client is admitted. Cancelling
/// `shutdown` stops it regardless of occupancy.
pub fn spawn_dispatcher<S: FrameSource>(
    source: S,
    config: &RelayConfig,
    shutdown: CancellationToken,
) -> DispatcherHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let registry: SharedRegistry = Arc::new(RwLock::new(HashMap::new()));
    let stats = Arc::new(RelayStats::new());

    let (reader, reader_state) = BroadcastReader::new(
        source,
        Arc::clone(&registry),
        Arc::clone(&stats),
        config.source_reconnect_delay(),
    );

    let actor = DispatcherActor::new(cmd_rx, registry, reader, shutdown, Arc::clone(&stats));
    tokio::spawn(actor.run());

    DispatcherHandle::new(cmd_tx, reader_state, stats)
}
