//! Command and error types for the registry actor.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use falog_core::ClientName;

use crate::server::session::SessionHandle;

/// Commands processed by the registry actor.
///
/// Every command carries a oneshot responder; the actor never replies
/// on any other path.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a freshly accepted connection. The actor generates a
    /// unique display name, wraps the pieces into a [`SessionHandle`]
    /// and stores it, all in one step.
    Add {
        addr: SocketAddr,
        writer: OwnedWriteHalf,
        cancel: CancellationToken,
        respond_to: oneshot::Sender<SessionHandle>,
    },

    /// Remove a session by name. Idempotent: removing a non-member
    /// answers `false`, never an error.
    Remove {
        name: ClientName,
        respond_to: oneshot::Sender<bool>,
    },

    /// Look up a session by its display name.
    Find {
        name: ClientName,
        respond_to: oneshot::Sender<Option<SessionHandle>>,
    },

    /// Insertion-ordered copy of all registered sessions.
    Snapshot {
        respond_to: oneshot::Sender<Vec<SessionHandle>>,
    },
}

/// Errors that can occur when talking to the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The actor has shut down.
    #[error("Registry channel closed")]
    ChannelClosed,
}
