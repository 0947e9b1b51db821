//! Current event context used when recording attendance.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Name and location of the event attendance is being recorded for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub name: String,
    pub location: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self {
            name: "none".to_string(),
            location: "none".to_string(),
        }
    }
}

/// Shared handle to the current event context.
///
/// Written by the operator (`event new <name> <location>`), read by
/// session workers when a scan arrives. Operator input is paced by a
/// human, so a plain RwLock is enough; readers take a cheap clone.
#[derive(Debug, Clone, Default)]
pub struct CurrentEvent {
    inner: Arc<RwLock<EventContext>>,
}

impl CurrentEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the current event.
    pub fn get(&self) -> EventContext {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            // A poisoned lock only happens if a writer panicked; fall
            // back to the default rather than propagate the panic.
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the current event name and location.
    pub fn set(&self, name: impl Into<String>, location: impl Into<String>) {
        let next = EventContext {
            name: name.into(),
            location: location.into(),
        };
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_none() {
        let current = CurrentEvent::new();
        let ctx = current.get();
        assert_eq!(ctx.name, "none");
        assert_eq!(ctx.location, "none");
    }

    #[test]
    fn set_replaces_both_fields() {
        let current = CurrentEvent::new();
        current.set("Orientation", "Main-Hall");
        let ctx = current.get();
        assert_eq!(ctx.name, "Orientation");
        assert_eq!(ctx.location, "Main-Hall");
    }

    #[test]
    fn clones_share_state() {
        let a = CurrentEvent::new();
        let b = a.clone();
        a.set("Seminar", "Annex");
        assert_eq!(b.get().name, "Seminar");
    }
}
