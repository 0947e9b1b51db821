//! TCP listener for scanner devices.
//!
//! The server:
//! - binds a TCP address and accepts device connections in a loop
//! - registers a session per connection and spawns its protocol worker
//! - owns the stop protocol via CancellationToken + TaskTracker
//!
//! Shutdown is a wait, not a poll: `stop()` cancels the root token
//! (which wakes the accept loop and every session blocked on a read)
//! and then awaits the task tracker, so it returns only after every
//! session has run its exit path and deregistered.

pub mod session;

pub use session::{SessionError, SessionHandle, SessionState, SessionWorker};

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use falog_core::{CurrentEvent, PersistenceGateway, Severity};

use crate::registry::RegistryHandle;
use crate::sink::EventSink;

/// Errors that can occur in server lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The address is invalid or already in use - the server may
    /// already be running in another process.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Server is currently not running")]
    NotRunning,
}

/// Lifecycle state held while the server is up.
struct Running {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// TCP server for fingerprint scanner devices.
pub struct DeviceServer {
    registry: RegistryHandle,
    gateway: Arc<dyn PersistenceGateway>,
    sink: EventSink,
    event: CurrentEvent,
    running: Mutex<Option<Running>>,
}

impl DeviceServer {
    pub fn new(
        registry: RegistryHandle,
        gateway: Arc<dyn PersistenceGateway>,
        sink: EventSink,
        event: CurrentEvent,
    ) -> Self {
        Self {
            registry,
            gateway,
            sink,
            event,
            running: Mutex::new(None),
        }
    }

    /// Binds the listening socket and starts the accept loop.
    ///
    /// Returns the bound address (useful when binding port 0).
    pub async fn start(&self, bind_addr: SocketAddr) -> Result<SocketAddr, ServerError> {
        if !self.is_closed() {
            return Err(ServerError::AlreadyRunning);
        }

        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: bind_addr,
            source,
        })?;

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        tracker.spawn(accept_loop(
            listener,
            cancel.clone(),
            tracker.clone(),
            self.registry.clone(),
            Arc::clone(&self.gateway),
            self.sink.clone(),
            self.event.clone(),
        ));

        let replaced = match self.running.lock() {
            Ok(mut guard) => guard.replace(Running {
                local_addr,
                cancel,
                tracker,
            }),
            Err(poisoned) => poisoned.into_inner().replace(Running {
                local_addr,
                cancel,
                tracker,
            }),
        };
        debug_assert!(replaced.is_none());

        info!(addr = %local_addr, "device server listening");
        self.sink.emit(Severity::Info, "Server started.");
        self.sink.emit(
            Severity::Server,
            format!("Waiting for a connection on port {}", local_addr.port()),
        );

        Ok(local_addr)
    }

    /// Stops the server and waits for every session to deregister.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
        .ok_or(ServerError::NotRunning)?;

        self.sink.emit(Severity::Warning, "Closing server...");
        self.sink
            .emit(Severity::Warning, "Disconnecting all clients from the server...");

        // Wakes the accept loop and every session blocked on a read.
        running.cancel.cancel();
        running.tracker.close();
        running.tracker.wait().await;

        self.sink
            .emit(Severity::Info, "All clients have been disconnected.");
        self.sink.emit(Severity::Info, "Server successfully closed.");
        info!("device server stopped");
        Ok(())
    }

    /// Pure read of the lifecycle state; the router gates
    /// session-targeted commands on this.
    pub fn is_closed(&self) -> bool {
        match self.running.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// The bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.running.lock() {
            Ok(guard) => guard.as_ref().map(|r| r.local_addr),
            Err(poisoned) => poisoned.into_inner().as_ref().map(|r| r.local_addr),
        }
    }
}

/// Accepts connections until the server is stopped.
///
/// Fire-and-forget per connection: the loop never waits on a session.
async fn accept_loop(
    listener: TcpListener,
    cancel: CancellationToken,
    tracker: TaskTracker,
    registry: RegistryHandle,
    gateway: Arc<dyn PersistenceGateway>,
    sink: EventSink,
    event: CurrentEvent,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("accept loop shutting down");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        sink.emit(Severity::Server, format!("Just connected to client {addr}"));

                        let (read_half, write_half) = stream.into_split();
                        // Child token: server stop cancels every
                        // session, a single disconnect cancels one.
                        let session_cancel = cancel.child_token();

                        match registry.add(addr, write_half, session_cancel).await {
                            Ok(handle) => {
                                info!(client = %handle.name(), %addr, "accepted device connection");
                                let worker = SessionWorker::new(
                                    read_half,
                                    handle,
                                    registry.clone(),
                                    Arc::clone(&gateway),
                                    sink.clone(),
                                    event.clone(),
                                );
                                tracker.spawn(worker.run());
                            }
                            Err(e) => {
                                // Registry gone means we are shutting down.
                                error!(error = %e, "failed to register session");
                            }
                        }
                    }
                    Err(e) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
        }
    }
}
