//! falog Core - Shared types for the fingerprint attendance logger server
//!
//! This crate provides the domain types shared between the daemon
//! (falogd) and external collaborators (the storage layer and the
//! operator console surface).
//!
//! All production code follows the panic-free policy: no `.unwrap()`,
//! `.expect()`, `panic!()`, `unreachable!()`, `todo!()`.

pub mod client;
pub mod date;
pub mod error;
pub mod event;
pub mod record;
pub mod sink;
pub mod storage;

// Re-exports for convenience
pub use client::ClientName;
pub use date::parse_iso_date;
pub use error::{DomainError, DomainResult};
pub use event::{CurrentEvent, EventContext};
pub use record::{AttendanceRow, Enrollee};
pub use sink::{ConsoleEvent, Severity};
pub use storage::{PersistenceError, PersistenceGateway};
