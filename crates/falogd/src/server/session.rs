//! Per-device session: outward-facing handle and protocol worker.
//!
//! Each accepted connection gets exactly one [`SessionWorker`] task
//! that owns the read half and runs the line protocol. Everything else
//! (router, accept loop, shutdown path) only ever touches the narrow
//! [`SessionHandle`] API: send a line, request disconnect, read
//! identity and state.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

use falog_core::{ClientName, CurrentEvent, PersistenceGateway, Severity};
use falog_protocol::{
    DeviceMessage, EnrollmentPayload, ProtocolError, ScanPayload, ServerCommand,
    ENROLLMENT_FIELD_COUNT,
};

use crate::registry::RegistryHandle;
use crate::sink::EventSink;

/// Protocol state of one session.
///
/// `Active` → `Disconnecting` → `Closed`, never backwards. A session
/// is a registry member exactly while not `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Disconnecting,
    Closed,
}

/// Errors that can occur inside a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed by peer")]
    Eof,

    #[error("Disconnect requested mid-payload")]
    Interrupted,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug)]
struct Shared {
    name: ClientName,
    addr: SocketAddr,
    writer: AsyncMutex<BufWriter<OwnedWriteHalf>>,
    cancel: CancellationToken,
    state: Mutex<SessionState>,
}

/// Outward-facing API of one session.
///
/// Cheap to clone; the registry stores one, the worker holds one, the
/// router borrows one for the duration of a command.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Shared>,
}

impl SessionHandle {
    pub(crate) fn new(
        name: ClientName,
        addr: SocketAddr,
        writer: OwnedWriteHalf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                name,
                addr,
                writer: AsyncMutex::new(BufWriter::new(writer)),
                cancel,
                state: Mutex::new(SessionState::Active),
            }),
        }
    }

    /// The generated display name, immutable for the session lifetime.
    pub fn name(&self) -> &ClientName {
        &self.inner.name
    }

    /// Remote address of the device.
    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// Current protocol state.
    pub fn state(&self) -> SessionState {
        match self.inner.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set_state(&self, next: SessionState) {
        match self.inner.state.lock() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Sends one protocol line to the device.
    pub async fn send_line(&self, line: &str) -> Result<(), SessionError> {
        let mut writer = self.inner.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Sends a server command as its line sequence.
    pub async fn send_command(&self, command: &ServerCommand) -> Result<(), SessionError> {
        for line in command.to_lines() {
            self.send_line(&line).await?;
        }
        Ok(())
    }

    /// Requests disconnection.
    ///
    /// Idempotent, and wakes the worker even while it is blocked on a
    /// read: cancellation is observed by the worker's `select!`, not
    /// polled between reads.
    pub fn disconnect(&self) {
        match self.inner.state.lock() {
            Ok(mut guard) => {
                if *guard == SessionState::Active {
                    *guard = SessionState::Disconnecting;
                }
            }
            Err(poisoned) => {
                let guard = poisoned.into_inner();
                drop(guard);
            }
        }
        self.inner.cancel.cancel();
    }

    /// Resolves when disconnection has been requested.
    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }

    /// Flushes and shuts down the write half. Errors are irrelevant at
    /// this point; the connection is going away either way.
    pub(crate) async fn release_writer(&self) {
        let mut writer = self.inner.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// The protocol worker: owns the read half and runs the line loop.
pub struct SessionWorker {
    reader: BufReader<OwnedReadHalf>,
    handle: SessionHandle,
    registry: RegistryHandle,
    gateway: Arc<dyn PersistenceGateway>,
    sink: EventSink,
    event: CurrentEvent,
}

impl SessionWorker {
    pub fn new(
        reader: OwnedReadHalf,
        handle: SessionHandle,
        registry: RegistryHandle,
        gateway: Arc<dyn PersistenceGateway>,
        sink: EventSink,
        event: CurrentEvent,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            handle,
            registry,
            gateway,
            sink,
            event,
        }
    }

    /// Runs the session to completion.
    ///
    /// Whatever ends the protocol loop - device disconnect, external
    /// disconnect, I/O failure, malformed payload - the exit path
    /// below runs exactly once: the session deregisters itself, state
    /// goes to `Closed`, the write half is released, and a closed
    /// event is emitted.
    pub async fn run(mut self) {
        let name = self.handle.name().clone();
        debug!(client = %name, addr = %self.handle.addr(), "session worker started");

        if let Err(e) = self.serve().await {
            self.sink.emit(
                Severity::Error,
                format!("Connection error for client {name}: {e}"),
            );
            warn!(client = %name, error = %e, "session ended with error");
        }

        // Deregister first so a snapshot never observes a Closed
        // member; idempotent, a second trigger finds nothing to remove.
        let _ = self.registry.remove(name.clone()).await;
        self.handle.set_state(SessionState::Closed);
        self.handle.release_writer().await;
        self.sink.emit(
            Severity::Server,
            format!("Successfully closed connection for client {name}"),
        );
        debug!(client = %name, "session worker finished");
    }

    async fn serve(&mut self) -> Result<(), SessionError> {
        loop {
            let line = match self.read_line().await {
                Ok(Some(line)) => line,
                // Disconnect requested from outside (operator command
                // or server shutdown): tell the device, then leave.
                Ok(None) => {
                    self.handle.set_state(SessionState::Disconnecting);
                    self.sink.emit(
                        Severity::Warning,
                        format!("Forced to close connection with client {}", self.handle.name()),
                    );
                    let _ = self.handle.send_command(&ServerCommand::Disconnect).await;
                    return Ok(());
                }
                // Peer went away between messages: a normal end.
                Err(SessionError::Eof) => {
                    self.handle.set_state(SessionState::Disconnecting);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            self.sink.emit(Severity::Client, line.clone());

            match DeviceMessage::classify(&line) {
                DeviceMessage::Disconnect => {
                    self.handle.set_state(SessionState::Disconnecting);
                    self.sink.emit(
                        Severity::Server,
                        format!("Closing connection for client {}", self.handle.name()),
                    );
                    return Ok(());
                }
                DeviceMessage::EnrollFinger => self.handle_enroll().await?,
                DeviceMessage::ScanFinger => self.handle_scan().await?,
                // Unrecognized device chatter: already logged verbatim.
                DeviceMessage::Chatter(_) => {}
            }
        }
    }

    /// Reads one line, or `None` when disconnection was requested.
    ///
    /// `Err(Eof)` means the peer closed the stream.
    async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        let mut buf = String::new();
        tokio::select! {
            _ = self.handle.cancelled() => Ok(None),
            read = self.reader.read_line(&mut buf) => {
                if read? == 0 {
                    Err(SessionError::Eof)
                } else {
                    Ok(Some(buf.trim_end_matches(['\r', '\n']).to_string()))
                }
            }
        }
    }

    /// Like [`read_line`], but inside a fixed-length payload, where a
    /// cancellation is an interruption rather than a clean stop.
    async fn read_payload_line(&mut self) -> Result<String, SessionError> {
        match self.read_line().await? {
            Some(line) => Ok(line),
            None => Err(SessionError::Interrupted),
        }
    }

    async fn handle_enroll(&mut self) -> Result<(), SessionError> {
        let mut lines = Vec::with_capacity(ENROLLMENT_FIELD_COUNT);
        for _ in 0..ENROLLMENT_FIELD_COUNT {
            match self.read_payload_line().await {
                Ok(line) => lines.push(line),
                Err(SessionError::Eof) => {
                    return Err(ProtocolError::ShortPayload {
                        got: lines.len(),
                        expected: ENROLLMENT_FIELD_COUNT,
                    }
                    .into())
                }
                Err(e) => return Err(e),
            }
        }

        let enrollee = EnrollmentPayload::from_lines(&lines)?.into_enrollee()?;

        // Storage failure does not end the session; the device can
        // keep enrolling and scanning.
        match self.gateway.enroll_user(&enrollee).await {
            Ok(()) => {
                self.sink.emit(
                    Severity::Client,
                    format!("Successfully enrolled: {}", enrollee.full_name),
                );
                self.sink.emit(
                    Severity::Client,
                    "=======================     INFORMATION     =======================",
                );
                self.sink
                    .emit(Severity::Client, format!("First Name : {}", enrollee.first_name));
                self.sink
                    .emit(Severity::Client, format!("Middle Name: {}", enrollee.middle_name));
                self.sink
                    .emit(Severity::Client, format!("Last Name  : {}", enrollee.last_name));
                self.sink
                    .emit(Severity::Client, format!("Age        : {}", enrollee.age));
                self.sink
                    .emit(Severity::Client, format!("Gender     : {}", enrollee.gender));
                self.sink
                    .emit(Severity::Client, format!("Phone No.  : {}", enrollee.phone_number));
                self.sink
                    .emit(Severity::Client, format!("Address    : {}", enrollee.address));
                self.sink.emit(
                    Severity::Client,
                    format!("Finger ID  : {}", enrollee.fingerprint_id),
                );
            }
            Err(e) => {
                self.sink.emit(
                    Severity::Error,
                    format!(
                        "Enrollment failed for finger ID {}: {e}",
                        enrollee.fingerprint_id
                    ),
                );
            }
        }
        Ok(())
    }

    async fn handle_scan(&mut self) -> Result<(), SessionError> {
        let line = match self.read_payload_line().await {
            Ok(line) => line,
            Err(SessionError::Eof) => {
                return Err(ProtocolError::ShortPayload { got: 0, expected: 1 }.into())
            }
            Err(e) => return Err(e),
        };
        let scan = ScanPayload::from_line(&line)?;

        let ctx = self.event.get();
        match self
            .gateway
            .record_attendance(scan.fingerprint_id, &ctx.name, &ctx.location)
            .await
        {
            Ok(full_name) => {
                self.sink.emit(
                    Severity::Client,
                    format!(
                        "Found match with finger ID {}: {full_name} ({} @ {})",
                        scan.fingerprint_id, ctx.name, ctx.location
                    ),
                );
            }
            Err(e) => {
                self.sink.emit(
                    Severity::Error,
                    format!(
                        "Attendance not recorded for finger ID {}: {e}",
                        scan.fingerprint_id
                    ),
                );
            }
        }
        Ok(())
    }
}
