//! Client registry using the actor pattern.
//!
//! The registry is the single owner of the set of connected scanner
//! sessions. It receives commands via a tokio mpsc channel; because
//! one actor task applies all mutations sequentially, lookups and
//! snapshots are linearizable with respect to add/remove without any
//! locking, and a snapshot can never observe a half-inserted session.
//!
//! Display names are generated inside the actor, atomically with
//! insertion, so two concurrent registrations can never collide.

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError};
pub use handle::RegistryHandle;

/// Command channel buffer size.
const COMMAND_BUFFER: usize = 100;

/// Spawns the registry actor and returns a handle for interaction.
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
