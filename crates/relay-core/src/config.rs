//! Relay configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. Durations are stored as milliseconds to keep the file
//! format plain; use the `Duration` accessors in code.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Default downstream listen address (all interfaces, port 8080).
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

/// Per-client outbound queue capacity, in frames.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Exclusive upper bound on an upstream frame's length, in bytes.
pub const DEFAULT_MAX_FRAME_LEN: usize = 20_000;

/// Deadline for a single write to a consumer.
pub const DEFAULT_CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for a single upstream read.
pub const DEFAULT_SOURCE_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Fixed delay between upstream reconnect attempts.
pub const DEFAULT_SOURCE_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Deadline for establishing the upstream connection.
pub const DEFAULT_SOURCE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Port assumed when the upstream address names only a host.
pub const DEFAULT_UPSTREAM_PORT: u16 = 80;

/// Largest `queue_capacity` accepted by `validate`, in frames.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// Largest `max_frame_len` accepted by `validate` (16 MiB).
const MAX_FRAME_LEN_CEILING: usize = 16 * 1024 * 1024;

/// Relay tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Upstream address (`host:port`). Required unless a synthetic source is used.
    pub upstream: Option<String>,

    /// Address the downstream server binds to
    pub listen: SocketAddr,

    /// Enable debug-level logging for the relay crates
    pub verbose: bool,

    /// Frames buffered per client before new frames are dropped
    pub queue_capacity: usize,

    /// Frames of this length or longer are rejected as a framing error
    pub max_frame_len: usize,

    /// Per-write deadline for consumer connections
    pub client_write_timeout_ms: u64,

    /// Per-read deadline for the upstream connection
    pub source_read_timeout_ms: u64,

    /// Delay between failed upstream reconnect attempts
    pub source_reconnect_delay_ms: u64,

    /// Deadline for establishing the upstream connection
    pub source_connect_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            listen: DEFAULT_LISTEN_ADDR,
            verbose: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            client_write_timeout_ms: millis(DEFAULT_CLIENT_WRITE_TIMEOUT),
            source_read_timeout_ms: millis(DEFAULT_SOURCE_READ_TIMEOUT),
            source_reconnect_delay_ms: millis(DEFAULT_SOURCE_RECONNECT_DELAY),
            source_connect_timeout_ms: millis(DEFAULT_SOURCE_CONNECT_TIMEOUT),
        }
    }
}

impl RelayConfig {
    /// Parses a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that every tunable is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(invalid(
                "queue_capacity",
                self.queue_capacity,
                "between 1 and 1048576",
            ));
        }
        if self.max_frame_len < 2 || self.max_frame_len > MAX_FRAME_LEN_CEILING {
            return Err(invalid(
                "max_frame_len",
                self.max_frame_len,
                "between 2 and 16777216",
            ));
        }
        for (field, value) in [
            ("client_write_timeout_ms", self.client_write_timeout_ms),
            ("source_read_timeout_ms", self.source_read_timeout_ms),
            ("source_reconnect_delay_ms", self.source_reconnect_delay_ms),
            ("source_connect_timeout_ms", self.source_connect_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, value, "a positive number of milliseconds"));
            }
        }
        if let Some(upstream) = &self.upstream {
            if upstream.trim().is_empty() {
                return Err(invalid("upstream", "\"\"", "host:port"));
            }
        }
        Ok(())
    }

    /// Upstream address with the port filled in.
    ///
    /// A bare host or IP (`10.0.0.7`, `cam.local`, `::1`) gets
    /// `DEFAULT_UPSTREAM_PORT`; anything that already carries a port is
    /// returned unchanged.
    pub fn upstream_addr(&self) -> Option<String> {
        let upstream = self.upstream.as_deref()?.trim();
        if upstream.parse::<SocketAddr>().is_ok() {
            return Some(upstream.to_string());
        }
        if let Ok(ip) = upstream.parse::<IpAddr>() {
            return Some(SocketAddr::new(ip, DEFAULT_UPSTREAM_PORT).to_string());
        }
        match upstream.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => Some(upstream.to_string()),
            _ => Some(format!("{upstream}:{DEFAULT_UPSTREAM_PORT}")),
        }
    }

    pub fn client_write_timeout(&self) -> Duration {
        Duration::from_millis(self.client_write_timeout_ms)
    }

    pub fn source_read_timeout(&self) -> Duration {
        Duration::from_millis(self.source_read_timeout_ms)
    }

    pub fn source_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.source_reconnect_delay_ms)
    }

    pub fn source_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.source_connect_timeout_ms)
    }

    /// Set the upstream address
    pub fn with_upstream(mut self, addr: impl Into<String>) -> Self {
        self.upstream = Some(addr.into());
        self
    }

    /// Set the listen address
    pub fn with_listen(mut self, addr: SocketAddr) -> Self {
        self.listen = addr;
        self
    }

    /// Enable or disable verbose logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the per-client queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the exclusive maximum frame length
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Set the per-write client deadline
    pub fn with_client_write_timeout(mut self, timeout: Duration) -> Self {
        self.client_write_timeout_ms = millis(timeout);
        self
    }

    /// Set the per-read source deadline
    pub fn with_source_read_timeout(mut self, timeout: Duration) -> Self {
        self.source_read_timeout_ms = millis(timeout);
        self
    }

    /// Set the delay between reconnect attempts
    pub fn with_source_reconnect_delay(mut self, delay: Duration) -> Self {
        self.source_reconnect_delay_ms = millis(delay);
        self
    }

    /// Set the upstream connect deadline
    pub fn with_source_connect_timeout(mut self, timeout: Duration) -> Self {
        self.source_connect_timeout_ms = millis(timeout);
        self
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn invalid(field: &'static str, value: impl ToString, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        value: value.to_string(),
        expected,
    }
}
