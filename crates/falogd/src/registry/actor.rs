//! Registry actor - owns the set of connected sessions.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use falog_core::ClientName;

use super::commands::RegistryCommand;
use crate::server::session::SessionHandle;

/// The registry actor - single owner of session membership.
///
/// Runs in one task and applies commands sequentially, so membership
/// changes are atomic with respect to concurrent lookups and
/// snapshots. Invariant: a session is a member exactly while its
/// protocol state is not `Closed`; workers deregister on every exit
/// path.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Session storage keyed by display name.
    sessions: HashMap<ClientName, SessionHandle>,

    /// Insertion order, used for listing.
    order: Vec<ClientName>,
}

impl RegistryActor {
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            sessions: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders
    /// dropped).
    pub async fn run(mut self) {
        info!("Client registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(sessions = self.sessions.len(), "Client registry actor stopped");
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add {
                addr,
                writer,
                cancel,
                respond_to,
            } => {
                let handle = self.handle_add(addr, writer, cancel);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(handle);
            }
            RegistryCommand::Remove { name, respond_to } => {
                let removed = self.handle_remove(&name);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Find { name, respond_to } => {
                let found = self.sessions.get(&name).cloned();
                let _ = respond_to.send(found);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let snapshot = self
                    .order
                    .iter()
                    .filter_map(|name| self.sessions.get(name).cloned())
                    .collect();
                let _ = respond_to.send(snapshot);
            }
        }
    }

    fn handle_add(
        &mut self,
        addr: SocketAddr,
        writer: OwnedWriteHalf,
        cancel: CancellationToken,
    ) -> SessionHandle {
        let name = self.generate_unique_name();
        let handle = SessionHandle::new(name.clone(), addr, writer, cancel);

        self.sessions.insert(name.clone(), handle.clone());
        self.order.push(name.clone());

        debug!(client = %name, %addr, total = self.sessions.len(), "session registered");
        handle
    }

    fn handle_remove(&mut self, name: &ClientName) -> bool {
        let removed = self.sessions.remove(name).is_some();
        if removed {
            self.order.retain(|n| n != name);
            debug!(client = %name, total = self.sessions.len(), "session deregistered");
        }
        removed
    }

    /// Generates a display name no current member holds.
    ///
    /// Collisions over a 62^8 space are vanishingly rare, but the loop
    /// makes the distinct-names invariant unconditional.
    fn generate_unique_name(&self) -> ClientName {
        let mut rng = rand::thread_rng();
        loop {
            let candidate = ClientName::generate(&mut rng);
            if !self.sessions.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}
