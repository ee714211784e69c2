//! camrelay daemon - client registry, upstream reader and broadcast server
//!
//! This crate provides the fan-out engine behind the `relayd` binary:
//! - `source` - upstream adapters (`TcpFrameSource`, `SyntheticSource`)
//! - `header` - write-once cache of the stream header
//! - `dispatcher` - actor owning the client registry
//! - `queue` - bounded per-client queues with drop-on-full
//! - `reader` - the broadcast reader loop and its reconnect state machine
//! - `server` - TCP accept loop and per-consumer connection handlers
//! - `relay` - `Relay`, the object tying one source to its consumers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         relayd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐  Admit/   ┌─────────────────────────┐  │
//! │  │  RelayServer    │  Remove   │    DispatcherActor      │  │
//! │  │ (TcpListener)   │──────────▶│  (registry owner)       │  │
//! │  └────────┬────────┘           └────────────┬────────────┘  │
//! │           │ connections                     │ start/quit    │
//! │           ▼                                 ▼               │
//! │  ┌─────────────────┐  queue    ┌─────────────────────────┐  │
//! │  │ConnectionHandler│◀──────────│    BroadcastReader      │◀─┼── upstream
//! │  │  (per consumer) │           │  (one FrameSource)      │  │
//! │  └─────────────────┘           └─────────────────────────┘  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod client;
pub mod dispatcher;
pub mod header;
pub mod queue;
pub mod reader;
pub mod relay;
pub mod server;
pub mod source;
pub mod stats;

pub use relay::{Relay, RelayError};
