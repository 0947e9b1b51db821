//! falog Daemon - scanner session server and operator command router
//!
//! This crate provides the long-running core of the attendance logger:
//! - `registry` - client registry actor tracking connected scanner sessions
//! - `server` - TCP listener and per-device session workers
//! - `router` - operator command parsing and dispatch
//! - `sink` - channel-backed display/log event sink
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        falogd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  operator text          ┌─────────────────────────────┐     │
//! │  ─────────────▶ Router ─┤ DeviceServer (start/stop)   │     │
//! │                         │ SessionHandle (send lines)  │     │
//! │                         │ PersistenceGateway (queries)│     │
//! │                         └─────────────────────────────┘     │
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │  DeviceServer   │────▶│       RegistryActor         │    │
//! │  │ (TCP listener)  │     │   (session state owner)     │    │
//! │  └────────┬────────┘     └─────────────────────────────┘    │
//! │           │ accept()                                        │
//! │           ▼                                                 │
//! │  ┌─────────────────┐                                        │
//! │  │  SessionWorker  │──▶ PersistenceGateway / EventSink      │
//! │  │  (per device)   │                                        │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate contains no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()` or `todo!()`. All fallible operations
//! return `Result` or `Option`, and channel closure is handled
//! gracefully.

pub mod registry;
pub mod router;
pub mod server;
pub mod sink;
