//! Client interface for interacting with the registry actor.

use std::net::SocketAddr;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use falog_core::ClientName;

use super::commands::{RegistryCommand, RegistryError};
use crate::server::session::SessionHandle;

/// Handle for interacting with the registry actor.
///
/// Cheap to clone; shared by the accept loop, every session worker and
/// the command router. All methods communicate with the actor via
/// channels, and channel closure is surfaced as
/// [`RegistryError::ChannelClosed`] (or a benign default for reads).
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Registers a new connection and returns its session handle.
    ///
    /// The display name is generated by the actor, atomically with
    /// insertion, so the returned handle is already visible to every
    /// subsequent lookup.
    pub async fn add(
        &self,
        addr: SocketAddr,
        writer: OwnedWriteHalf,
        cancel: CancellationToken,
    ) -> Result<SessionHandle, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Add {
                addr,
                writer,
                cancel,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Removes a session by name.
    ///
    /// Idempotent: returns `Ok(false)` if no such member existed.
    pub async fn remove(&self, name: ClientName) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Remove {
                name,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Looks up a session by its display name.
    ///
    /// Returns `None` if the session doesn't exist or if the actor has
    /// shut down.
    pub async fn find_by_name(&self, name: ClientName) -> Option<SessionHandle> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Find {
                name,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Returns an insertion-ordered copy of all registered sessions.
    ///
    /// Returns an empty vector if the actor has shut down.
    pub async fn snapshot(&self) -> Vec<SessionHandle> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Checks if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
