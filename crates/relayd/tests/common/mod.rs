//! Shared helpers for relayd integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use relay_core::{Frame, RelayConfig};
use relay_protocol::{FrameCodec, FrameReader};
use relayd::source::{ConnectError, FrameSource, ReadError, SessionState};
use relayd::Relay;

pub const HEADER: &[u8] = b"HEADER";

#[derive(Default)]
struct ScriptState {
    failing_inits: usize,
    init_times: Vec<Instant>,
    reads: usize,
}

/// A source fed frame by frame from the test.
pub struct ScriptedSource {
    rx: mpsc::UnboundedReceiver<Result<Frame, ReadError>>,
    state: Arc<Mutex<ScriptState>>,
    connected: bool,
}

/// Test-side controls for a `ScriptedSource`.
#[derive(Clone)]
pub struct Script {
    tx: mpsc::UnboundedSender<Result<Frame, ReadError>>,
    state: Arc<Mutex<ScriptState>>,
}

pub fn scripted() -> (ScriptedSource, Script) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = Arc::new(Mutex::new(ScriptState::default()));
    let source = ScriptedSource {
        rx,
        state: Arc::clone(&state),
        connected: false,
    };
    (source, Script { tx, state })
}

impl Script {
    pub fn push(&self, payload: &[u8]) {
        self.tx.send(Ok(Frame::from(payload.to_vec()))).unwrap();
    }

    /// Fails the pending read as a lost upstream session.
    pub fn push_error(&self) {
        self.tx.send(Err(ReadError::Closed)).unwrap();
    }

    pub fn fail_next_inits(&self, n: usize) {
        self.state.lock().unwrap().failing_inits = n;
    }

    pub fn init_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().init_times.clone()
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

impl FrameSource for ScriptedSource {
    async fn initialize(&mut self) -> Result<(), ConnectError> {
        self.connected = false;
        {
            let mut state = self.state.lock().unwrap();
            state.init_times.push(Instant::now());
            if state.failing_inits > 0 {
                state.failing_inits -= 1;
                return Err(ConnectError::Unavailable("scripted".into()));
            }
        }
        self.connected = true;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Frame, ReadError> {
        if !self.connected {
            return Err(ReadError::NotConnected);
        }
        self.state.lock().unwrap().reads += 1;

        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(e)) => {
                self.connected = false;
                Err(e)
            }
            None => std::future::pending().await,
        }
    }

    fn session_state(&self) -> SessionState {
        if self.connected {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }
}

/// Starts a relay whose upstream first sends `HEADER`.
pub async fn start_relay(config: RelayConfig) -> (Relay, Script) {
    let (source, script) = scripted();
    script.push(HEADER);
    let relay = Relay::start(source, config, CancellationToken::new())
        .await
        .expect("relay should start");
    (relay, script)
}

/// Reads one frame from a consumer connection, failing the test after 5s.
pub async fn next_frame<R: AsyncRead + Unpin>(reader: &mut FrameReader<R>) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(5), reader.read_frame())
        .await
        .expect("timed out waiting for frame")
        .expect("read failed")
        .expect("connection closed")
        .as_bytes()
        .to_vec()
}

pub fn consumer_reader<R: AsyncRead + Unpin>(inner: R) -> FrameReader<R> {
    FrameReader::new(inner, FrameCodec::default())
}

/// Polls until the dispatcher reports `expected` clients.
pub async fn wait_for_clients(relay: &Relay, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while relay.dispatcher().client_count().await != expected {
        assert!(Instant::now() < deadline, "client count never reached {expected}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
