//! TCP upstream carrying length-prefixed frames.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use relay_core::{Frame, RelayConfig};
use relay_protocol::{FrameCodec, FrameReader};

use super::{ConnectError, FrameSource, ReadError, SessionState};

/// Reads frames from a single upstream TCP connection.
pub struct TcpFrameSource {
    addr: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    codec: FrameCodec,
    reader: Option<FrameReader<TcpStream>>,
}

impl TcpFrameSource {
    /// Creates a disconnected source for `addr` (`host:port`).
    pub fn new(
        addr: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
        max_frame_len: usize,
    ) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            read_timeout,
            codec: FrameCodec::new(max_frame_len),
            reader: None,
        }
    }

    /// Creates a source using the timeouts and frame limit from `config`.
    pub fn from_config(addr: impl Into<String>, config: &RelayConfig) -> Self {
        Self::new(
            addr,
            config.source_connect_timeout(),
            config.source_read_timeout(),
            config.max_frame_len,
        )
    }
}

impl FrameSource for TcpFrameSource {
    async fn initialize(&mut self) -> Result<(), ConnectError> {
        self.reader = None;

        let stream = match timeout(self.connect_timeout, TcpStream::connect(self.addr.as_str())).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ConnectError::Io {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ConnectError::Timeout {
                    addr: self.addr.clone(),
                    timeout: self.connect_timeout,
                })
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(upstream = %self.addr, error = %e, "Failed to set TCP_NODELAY");
        }

        self.reader = Some(FrameReader::new(stream, self.codec));
        info!(upstream = %self.addr, "Upstream connected");
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Frame, ReadError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(ReadError::NotConnected);
        };

        let result = match timeout(self.read_timeout, reader.read_frame()).await {
            Ok(Ok(Some(frame))) => Ok(frame),
            Ok(Ok(None)) => Err(ReadError::Closed),
            Ok(Err(e)) => Err(ReadError::from(e)),
            Err(_) => Err(ReadError::Timeout(self.read_timeout)),
        };

        // Any failure ends the session; the stream may be mid-frame.
        if result.is_err() {
            self.reader = None;
        }
        result
    }

    fn session_state(&self) -> SessionState {
        if self.reader.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use super::*;

    const SHORT: Duration = Duration::from_millis(200);

    async fn upstream() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    fn prefixed(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[tokio::test]
    async fn test_read_frames_in_order() {
        let (listener, addr) = upstream().await;
        let mut source = TcpFrameSource::new(addr, SHORT, SHORT, 64);

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&prefixed(b"H")).await.unwrap();
            stream.write_all(&prefixed(b"F1")).await.unwrap();
            stream
        });

        source.initialize().await.unwrap();
        assert_eq!(source.session_state(), SessionState::Connected);

        let _stream = accept.await.unwrap();
        assert_eq!(source.read_message().await.unwrap().as_bytes(), b"H");
        assert_eq!(source.read_message().await.unwrap().as_bytes(), b"F1");
    }

    #[tokio::test]
    async fn test_frame_at_max_len_is_read_error() {
        let (listener, addr) = upstream().await;
        let mut source = TcpFrameSource::new(addr, SHORT, SHORT, 8);

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&prefixed(&[0u8; 8])).await.unwrap();
            stream
        });

        source.initialize().await.unwrap();
        let _stream = accept.await.unwrap();

        let err = source.read_message().await.unwrap_err();
        assert!(matches!(err, ReadError::FrameTooLarge { len: 8, max: 8 }));
        assert_eq!(source.session_state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_read_timeout_disconnects() {
        let (listener, addr) = upstream().await;
        let mut source = TcpFrameSource::new(addr, SHORT, Duration::from_millis(50), 64);

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        source.initialize().await.unwrap();
        let _held = accept.await.unwrap();

        let err = source.read_message().await.unwrap_err();
        assert!(matches!(err, ReadError::Timeout(_)));
        assert_eq!(source.session_state(), SessionState::Disconnected);

        // No further reads until re-initialized.
        assert!(matches!(
            source.read_message().await,
            Err(ReadError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_upstream_close_is_read_error() {
        let (listener, addr) = upstream().await;
        let mut source = TcpFrameSource::new(addr, SHORT, SHORT, 64);

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });
        source.initialize().await.unwrap();
        accept.await.unwrap();

        assert!(matches!(source.read_message().await, Err(ReadError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, addr) = upstream().await;
        drop(listener);

        let mut source = TcpFrameSource::new(addr, SHORT, SHORT, 64);
        let err = source.initialize().await.unwrap_err();

        assert!(matches!(err, ConnectError::Io { .. }));
        assert_eq!(source.session_state(), SessionState::Disconnected);
    }
}
