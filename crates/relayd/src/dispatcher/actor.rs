//! Dispatcher actor - sole writer of the client registry.
//!
//! Processes admissions and removals one at a time and starts or stops the
//! broadcast reader when occupancy crosses zero.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the caller went away)
//! - A reader task that fails to join is logged, not propagated

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_core::ClientId;

use super::commands::{DispatcherCommand, DispatcherError};
use super::SharedRegistry;
use crate::client::{Client, ClientInfo};
use crate::reader::BroadcastReader;
use crate::source::FrameSource;
use crate::stats::RelayStats;

/// A running reader loop and the token that stops it.
struct ActiveReader {
    quit: CancellationToken,
    task: JoinHandle<()>,
}

/// The dispatcher actor.
///
/// Owns all registry mutation. The broadcast reader sees the same map
/// through `SharedRegistry` but only ever takes read locks.
pub struct DispatcherActor<S> {
    receiver: mpsc::Receiver<DispatcherCommand>,

    /// Queues the reader fans out to
    registry: SharedRegistry,

    /// Per-client metadata, keyed like `registry`
    clients: HashMap<ClientId, ClientInfo>,

    reader: BroadcastReader<S>,
    active: Option<ActiveReader>,

    /// Parent of every reader quit token
    shutdown: CancellationToken,

    stats: Arc<RelayStats>,
}

impl<S: FrameSource> DispatcherActor<S> {
    pub fn new(
        receiver: mpsc::Receiver<DispatcherCommand>,
        registry: SharedRegistry,
        reader: BroadcastReader<S>,
        shutdown: CancellationToken,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            receiver,
            registry,
            clients: HashMap::new(),
            reader,
            active: None,
            shutdown,
            stats,
        }
    }

    /// Runs until every `DispatcherHandle` is dropped, then stops the reader.
    pub async fn run(mut self) {
        info!("Dispatcher starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        self.stop_reader().await;
        info!(occupancy = self.clients.len(), "Dispatcher stopped");
    }

    async fn handle_command(&mut self, cmd: DispatcherCommand) {
        match cmd {
            DispatcherCommand::Admit { client, respond_to } => {
                let result = self.handle_admit(client).await;
                let _ = respond_to.send(result);
            }
            DispatcherCommand::Remove {
                client_id,
                respond_to,
            } => {
                let result = self.handle_remove(client_id).await;
                let _ = respond_to.send(result);
            }
            DispatcherCommand::ClientCount { respond_to } => {
                let _ = respond_to.send(self.client_count());
            }
            DispatcherCommand::ListClients { respond_to } => {
                let _ = respond_to.send(self.list_clients());
            }
        }
    }

    async fn handle_admit(&mut self, client: Client) -> Result<(), DispatcherError> {
        if self.clients.contains_key(&client.id) {
            warn!(client_id = %client.id, "Rejected duplicate admission");
            return Err(DispatcherError::AlreadyAdmitted(client.id));
        }

        let id = client.id;
        self.registry.write().await.insert(id, client.queue);
        self.clients.insert(
            id,
            ClientInfo {
                id,
                peer: client.peer,
                admitted_at: Utc::now(),
            },
        );
        self.stats.record_admitted();

        let occupancy = self.clients.len();
        info!(client_id = %id, peer = ?client.peer, occupancy, "Client admitted");

        if occupancy == 1 {
            self.start_reader();
        }
        Ok(())
    }

    async fn handle_remove(&mut self, client_id: ClientId) -> Result<(), DispatcherError> {
        if self.clients.remove(&client_id).is_none() {
            debug!(client_id = %client_id, "Remove for unknown client");
            return Err(DispatcherError::ClientNotFound(client_id));
        }

        self.registry.write().await.remove(&client_id);
        self.stats.record_removed();

        let occupancy = self.clients.len();
        info!(client_id = %client_id, occupancy, "Client removed");

        if occupancy == 0 {
            self.stop_reader().await;
        }
        Ok(())
    }

    fn start_reader(&mut self) {
        if self.active.is_some() {
            return;
        }

        let quit = self.shutdown.child_token();
        let task = self.reader.start(quit.clone());
        self.active = Some(ActiveReader { quit, task });
        debug!("Broadcast reader requested to start");
    }

    /// Signals quit and waits for the loop to release the source.
    async fn stop_reader(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.quit.cancel();
        if let Err(e) = active.task.await {
            warn!(error = %e, "Broadcast reader task failed");
        }
        debug!("Broadcast reader joined");
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn list_clients(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self.clients.values().cloned().collect();
        clients.sort_by_key(|info| (info.admitted_at, info.id));
        clients
    }
}
