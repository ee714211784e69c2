//! camrelay core - shared types for the frame relay
//!
//! This crate provides the domain types shared between the wire
//! protocol (`relay-protocol`) and the daemon (`relayd`):
//! - `Frame` - one opaque, reference-counted unit of the relayed stream
//! - `ClientId` - process-unique identity of an admitted consumer
//! - `RelayConfig` - tunables, loadable from TOML
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod client;
pub mod config;
pub mod error;
pub mod frame;

pub use client::ClientId;
pub use config::{
    RelayConfig, DEFAULT_CLIENT_WRITE_TIMEOUT, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_FRAME_LEN,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SOURCE_CONNECT_TIMEOUT, DEFAULT_SOURCE_READ_TIMEOUT,
    DEFAULT_SOURCE_RECONNECT_DELAY, DEFAULT_UPSTREAM_PORT, MAX_QUEUE_CAPACITY,
};
pub use error::ConfigError;
pub use frame::Frame;
