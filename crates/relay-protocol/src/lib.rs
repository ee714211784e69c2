//! camrelay wire protocol
//!
//! Every connection, upstream and downstream, carries the same framing:
//!
//! ```text
//! ┌──────────────────┬─────────────────────────────┐
//! │ length: u32 (BE) │ payload: `length` bytes     │
//! └──────────────────┴─────────────────────────────┘
//! ```
//!
//! Payloads are opaque. A length at or above the configured maximum is a
//! protocol violation: the stream is considered desynchronized and the
//! frame is never truncated.

pub mod codec;
pub mod error;
pub mod io;

pub use codec::{FrameCodec, LENGTH_PREFIX_LEN};
pub use error::ProtocolError;
pub use io::{FrameReader, FrameWriter};
