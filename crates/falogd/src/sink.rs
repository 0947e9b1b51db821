//! Channel-backed display/log sink.
//!
//! The core classifies operator-facing messages and pushes them onto a
//! channel; whatever owns the receiving end renders them (the daemon
//! binary prints to stdout, a GUI would append to a console widget).
//! Nothing in the core ever formats for a screen directly.

use falog_core::{ConsoleEvent, Severity};
use tokio::sync::mpsc;
use tracing::trace;

/// Cheap-to-clone sender half of the display sink.
///
/// Emission is fire-and-forget: if the receiving end is gone the event
/// is dropped. The sink must never be able to stall a session worker.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ConsoleEvent>,
}

impl EventSink {
    /// Creates a sink and the receiver the display surface drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ConsoleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Creates a sink whose events go nowhere. Useful in tests that
    /// don't assert on console output.
    pub fn disconnected() -> Self {
        let (sink, _rx) = Self::channel();
        sink
    }

    /// Classifies and emits one message.
    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        let event = ConsoleEvent::new(severity, message);
        trace!(severity = %event.severity, message = %event.message, "console event");
        // Receiver gone means no display surface is attached; drop.
        let _ = self.tx.send(event);
    }
}
