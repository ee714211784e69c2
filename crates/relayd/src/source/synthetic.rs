//! In-process frame generator for running the relay without a camera.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::time::{sleep_until, Instant};

use relay_core::Frame;

use super::{ConnectError, FrameSource, ReadError, SessionState};

/// Magic at the start of a jsmpeg stream header.
pub const STREAM_HEADER_MAGIC: &[u8; 4] = b"jsmp";

const DEFAULT_WIDTH: u16 = 320;
const DEFAULT_HEIGHT: u16 = 240;
const DEFAULT_FRAME_LEN: usize = 4096;
const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Generates a stream header followed by fixed-size frames at a fixed rate.
///
/// Every session starts with an 8-byte header (`jsmp`, width and height as
/// big-endian `u16`), mirroring what a camera sends on each new connection.
/// Data frames carry their sequence number in the first 8 bytes and a
/// repeating fill byte after that.
#[derive(Debug)]
pub struct SyntheticSource {
    width: u16,
    height: u16,
    frame_len: usize,
    interval: Duration,
    state: SessionState,
    header_sent: bool,
    sequence: u64,
    next_frame_at: Instant,
}

impl SyntheticSource {
    pub fn new(width: u16, height: u16, frame_len: usize, interval: Duration) -> Self {
        Self {
            width,
            height,
            frame_len: frame_len.max(8),
            interval,
            state: SessionState::Disconnected,
            header_sent: false,
            sequence: 0,
            next_frame_at: Instant::now(),
        }
    }

    /// A generator whose frames fit under `max_frame_len`.
    pub fn for_max_frame_len(max_frame_len: usize) -> Self {
        let frame_len = DEFAULT_FRAME_LEN.min(max_frame_len.saturating_sub(1));
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, frame_len, DEFAULT_INTERVAL)
    }

    /// The header frame this source emits at the start of each session.
    pub fn stream_header(&self) -> Frame {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_slice(STREAM_HEADER_MAGIC);
        buf.put_u16(self.width);
        buf.put_u16(self.height);
        Frame::from(buf.freeze())
    }

    fn data_frame(&self) -> Frame {
        let mut buf = BytesMut::with_capacity(self.frame_len);
        buf.put_u64(self.sequence);
        buf.put_bytes(self.sequence as u8, self.frame_len.saturating_sub(8));
        Frame::from(buf.freeze())
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_FRAME_LEN, DEFAULT_INTERVAL)
    }
}

impl FrameSource for SyntheticSource {
    async fn initialize(&mut self) -> Result<(), ConnectError> {
        self.state = SessionState::Connected;
        self.header_sent = false;
        self.next_frame_at = Instant::now() + self.interval;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Frame, ReadError> {
        if self.state == SessionState::Disconnected {
            return Err(ReadError::NotConnected);
        }

        if !self.header_sent {
            self.header_sent = true;
            return Ok(self.stream_header());
        }

        // A cancelled wait resumes at the same deadline. Ticks missed while
        // nobody was reading are skipped, not replayed.
        self.next_frame_at = self.next_frame_at.max(Instant::now());
        sleep_until(self.next_frame_at).await;
        self.next_frame_at += self.interval;

        self.sequence += 1;
        Ok(self.data_frame())
    }

    fn session_state(&self) -> SessionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_before_initialize() {
        let mut source = SyntheticSource::default();
        assert!(matches!(
            source.read_message().await,
            Err(ReadError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_header_then_sequenced_frames() {
        let mut source = SyntheticSource::new(640, 480, 32, Duration::from_millis(1));
        source.initialize().await.unwrap();

        let header = source.read_message().await.unwrap();
        assert_eq!(header.as_bytes(), b"jsmp\x02\x80\x01\xe0");

        let first = source.read_message().await.unwrap();
        let second = source.read_message().await.unwrap();
        assert_eq!(first.len(), 32);
        assert_eq!(&first.as_bytes()[..8], &1u64.to_be_bytes());
        assert_eq!(&second.as_bytes()[..8], &2u64.to_be_bytes());
    }

    #[tokio::test]
    async fn test_reinitialize_resends_header() {
        let mut source = SyntheticSource::new(2, 2, 16, Duration::from_millis(1));
        source.initialize().await.unwrap();
        let _ = source.read_message().await.unwrap();
        let _ = source.read_message().await.unwrap();

        source.initialize().await.unwrap();
        let header = source.read_message().await.unwrap();
        assert!(header.as_bytes().starts_with(STREAM_HEADER_MAGIC));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_paced_by_interval() {
        let mut source = SyntheticSource::new(2, 2, 16, Duration::from_millis(100));
        source.initialize().await.unwrap();
        let _ = source.read_message().await.unwrap();

        let start = Instant::now();
        let _ = source.read_message().await.unwrap();
        let _ = source.read_message().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_does_not_burst() {
        let mut source = SyntheticSource::new(2, 2, 16, Duration::from_millis(100));
        source.initialize().await.unwrap();
        let _ = source.read_message().await.unwrap();
        let _ = source.read_message().await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;

        let start = Instant::now();
        for _ in 0..3 {
            let _ = source.read_message().await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_frames_fit_under_max() {
        let source = SyntheticSource::for_max_frame_len(1000);
        assert!(source.data_frame().len() < 1000);
    }
}
