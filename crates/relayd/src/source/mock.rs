//! Scripted source for unit tests.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Instant;

use relay_core::Frame;

use super::{ConnectError, FrameSource, ReadError, SessionState};

#[derive(Debug, Default)]
struct ScriptState {
    failing_inits: usize,
    init_times: Vec<Instant>,
    reads: usize,
}

/// Source whose reads and initializations are driven by a [`MockScript`].
pub(crate) struct MockSource {
    rx: mpsc::UnboundedReceiver<Result<Frame, ReadError>>,
    state: Arc<Mutex<ScriptState>>,
    connected: bool,
}

/// Test-side controls for a [`MockSource`].
#[derive(Clone)]
pub(crate) struct MockScript {
    tx: mpsc::UnboundedSender<Result<Frame, ReadError>>,
    state: Arc<Mutex<ScriptState>>,
}

impl MockSource {
    /// A source that is already initialized.
    pub(crate) fn connected() -> (Self, MockScript) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ScriptState::default()));
        let source = Self {
            rx,
            state: Arc::clone(&state),
            connected: true,
        };
        (source, MockScript { tx, state })
    }
}

impl MockScript {
    pub(crate) fn push_frame(&self, payload: &[u8]) {
        let _ = self.tx.send(Ok(Frame::from(payload.to_vec())));
    }

    /// Makes the pending read fail as if the upstream closed.
    pub(crate) fn push_error(&self) {
        let _ = self.tx.send(Err(ReadError::Closed));
    }

    /// The next `n` calls to `initialize` fail.
    pub(crate) fn fail_next_inits(&self, n: usize) {
        self.state.lock().unwrap().failing_inits = n;
    }

    pub(crate) fn init_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().init_times.clone()
    }

    /// Number of `read_message` calls made so far.
    pub(crate) fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

impl FrameSource for MockSource {
    async fn initialize(&mut self) -> Result<(), ConnectError> {
        self.connected = false;
        {
            let mut state = self.state.lock().unwrap();
            state.init_times.push(Instant::now());
            if state.failing_inits > 0 {
                state.failing_inits -= 1;
                return Err(ConnectError::Unavailable("scripted failure".into()));
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
