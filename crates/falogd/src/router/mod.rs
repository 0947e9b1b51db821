//! Operator command router.
//!
//! Free text in, typed result out. The router matches the input
//! against the static command table, then each handler validates its
//! own preconditions (server running, session exists, argument shape)
//! and either drives the server, forwards protocol messages to one
//! session, or calls the persistence gateway. A failed command is
//! reported through the returned error; it never takes the router or
//! any session down with it.

mod table;

pub use table::{find_command, matches_reference, CommandDef, CommandId, COMMANDS};

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tracing::debug;

use falog_core::{
    parse_iso_date, AttendanceRow, ClientName, CurrentEvent, Enrollee, PersistenceGateway,
    Severity,
};
use falog_protocol::ServerCommand;

use crate::registry::{RegistryError, RegistryHandle};
use crate::server::{DeviceServer, ServerError, SessionHandle};
use crate::sink::EventSink;

/// Errors a single router invocation can report.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Command input is empty")]
    EmptyInput,

    #[error("Not a recognizable command. See list of available commands.")]
    UnknownCommand,

    #[error("Missing arguments. Usage: {usage}")]
    MissingArguments { usage: &'static str },

    #[error("Client does not exist: {name}")]
    ClientNotFound { name: String },

    #[error("Invalid date format: {input} (expected yyyy-mm-dd)")]
    InvalidDateFormat { input: String },

    #[error("Server must be running before executing this command")]
    NotRunning,

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Routes operator input to server actions, sessions, or the gateway.
pub struct CommandRouter {
    server: Arc<DeviceServer>,
    registry: RegistryHandle,
    gateway: Arc<dyn PersistenceGateway>,
    event: CurrentEvent,
    sink: EventSink,
    bind_addr: SocketAddr,
    /// Enrollment data staged by the external enrollment form; taken
    /// by the next `enroll <client>` command.
    pending_enrollment: Mutex<Option<Enrollee>>,
}

impl CommandRouter {
    pub fn new(
        server: Arc<DeviceServer>,
        registry: RegistryHandle,
        gateway: Arc<dyn PersistenceGateway>,
        event: CurrentEvent,
        sink: EventSink,
        bind_addr: SocketAddr,
    ) -> Self {
        Self {
            server,
            registry,
            gateway,
            event,
            sink,
            bind_addr,
            pending_enrollment: Mutex::new(None),
        }
    }

    /// Stages enrollment data for the next `enroll <client>` command.
    ///
    /// This is the submit path of the external enrollment form.
    pub fn submit_enrollment(&self, enrollee: Enrollee) {
        match self.pending_enrollment.lock() {
            Ok(mut guard) => *guard = Some(enrollee),
            Err(poisoned) => *poisoned.into_inner() = Some(enrollee),
        }
    }

    fn take_enrollment(&self) -> Option<Enrollee> {
        match self.pending_enrollment.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Routes one line of operator input.
    pub async fn route(&self, input: &str) -> Result<(), CommandError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CommandError::EmptyInput);
        }

        let def = find_command(input).ok_or(CommandError::UnknownCommand)?;
        debug!(command = ?def.id, input, "routing operator command");

        match def.id {
            CommandId::StartServer => {
                self.server.start(self.bind_addr).await?;
                Ok(())
            }
            CommandId::StopServer => {
                self.server.stop().await?;
                Ok(())
            }
            CommandId::Enroll => self.handle_enroll(input, def).await,
            CommandId::Disconnect => self.handle_disconnect(input, def).await,
            CommandId::ListClients => self.handle_list_clients().await,
            CommandId::Reboot => self.handle_reboot(input, def).await,
            CommandId::InitTables => self.handle_init_tables().await,
            CommandId::ExportDate => self.handle_export_date(input, def).await,
            CommandId::ExportEvent => self.handle_export_event(input, def).await,
            CommandId::ExportBare => Err(CommandError::MissingArguments { usage: def.syntax }),
            CommandId::ShowEvent => self.handle_show_event(),
            CommandId::SetEvent => self.handle_set_event(input, def),
        }
    }

    fn ensure_running(&self) -> Result<(), CommandError> {
        if self.server.is_closed() {
            return Err(CommandError::NotRunning);
        }
        Ok(())
    }

    /// Resolves the session a command targets, or reports the miss.
    async fn find_session(&self, name: &str) -> Result<SessionHandle, CommandError> {
        match self.registry.find_by_name(ClientName::from(name)).await {
            Some(handle) => {
                self.sink.emit(Severity::Info, format!("{name} found!"));
                Ok(handle)
            }
            None => Err(CommandError::ClientNotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn handle_enroll(&self, input: &str, def: &CommandDef) -> Result<(), CommandError> {
        self.ensure_running()?;
        let name = nth_token(input, 1).ok_or(CommandError::MissingArguments { usage: def.syntax })?;
        let session = self.find_session(name).await?;

        let Some(enrollee) = self.take_enrollment() else {
            self.sink.emit(
                Severity::Invalid,
                "No enrollment data submitted. Fill out the enrollment form first.",
            );
            return Ok(());
        };

        if let Err(e) = session.send_command(&ServerCommand::Enroll(enrollee)).await {
            self.sink.emit(
                Severity::Error,
                format!("Error sending command to {}: {e}", session.name()),
            );
        }
        Ok(())
    }

    async fn handle_disconnect(&self, input: &str, def: &CommandDef) -> Result<(), CommandError> {
        self.ensure_running()?;
        let name = nth_token(input, 1).ok_or(CommandError::MissingArguments { usage: def.syntax })?;
        let session = self.find_session(name).await?;
        // The worker observes the cancellation, sends the wire
        // disconnect, and deregisters itself.
        session.disconnect();
        Ok(())
    }

    async fn handle_list_clients(&self) -> Result<(), CommandError> {
        self.ensure_running()?;
        let clients = self.registry.snapshot().await;
        if clients.is_empty() {
            self.sink.emit(Severity::Error, "No clients found.");
            return Ok(());
        }
        for client in clients {
            self.sink.emit(
                Severity::Info,
                format!("|#| {} | {} |#|", client.name(), client.addr()),
            );
        }
        Ok(())
    }

    async fn handle_reboot(&self, input: &str, def: &CommandDef) -> Result<(), CommandError> {
        self.ensure_running()?;
        let name = nth_token(input, 1).ok_or(CommandError::MissingArguments { usage: def.syntax })?;
        let session = self.find_session(name).await?;
        if let Err(e) = session.send_command(&ServerCommand::Reboot).await {
            self.sink.emit(
                Severity::Error,
                format!("Error sending command to {}: {e}", session.name()),
            );
        }
        Ok(())
    }

    async fn handle_init_tables(&self) -> Result<(), CommandError> {
        match self.gateway.init_tables().await {
            Ok(()) => self.sink.emit(Severity::Info, "Init Database OK"),
            Err(e) => self
                .sink
                .emit(Severity::Error, format!("Init Database FAIL: {e}")),
        }
        Ok(())
    }

    async fn handle_export_date(&self, input: &str, def: &CommandDef) -> Result<(), CommandError> {
        let raw = nth_token(input, 2).ok_or(CommandError::MissingArguments { usage: def.syntax })?;
        // Validate before the gateway gets involved.
        let date = parse_iso_date(raw).map_err(|_| CommandError::InvalidDateFormat {
            input: raw.to_string(),
        })?;

        match self.gateway.query_attendance_by_date(date).await {
            Ok(rows) => self.report_rows(&rows),
            Err(e) => self
                .sink
                .emit(Severity::Error, format!("Export query failed: {e}")),
        }
        Ok(())
    }

    async fn handle_export_event(&self, input: &str, def: &CommandDef) -> Result<(), CommandError> {
        let name = rest_after_token(input, 2)
            .ok_or(CommandError::MissingArguments { usage: def.syntax })?;

        match self.gateway.query_attendance_by_event(name).await {
            Ok(rows) => self.report_rows(&rows),
            Err(e) => self
                .sink
                .emit(Severity::Error, format!("Export query failed: {e}")),
        }
        Ok(())
    }

    fn report_rows(&self, rows: &[AttendanceRow]) {
        if rows.is_empty() {
            self.sink.emit(Severity::Info, "No attendance records found.");
            return;
        }
        for row in rows {
            self.sink.emit(
                Severity::Info,
                format!(
                    "{} | {} | {} | {} | {}",
                    row.full_name,
                    row.date_attended,
                    row.time_attended,
                    row.event_name,
                    row.event_location
                ),
            );
        }
        self.sink
            .emit(Severity::Info, format!("Export: {} record(s)", rows.len()));
    }

    fn handle_show_event(&self) -> Result<(), CommandError> {
        let ctx = self.event.get();
        self.sink
            .emit(Severity::Info, format!("Current Event Name: {}", ctx.name));
        self.sink.emit(
            Severity::Info,
            format!("Current Event Location: {}", ctx.location),
        );
        Ok(())
    }

    fn handle_set_event(&self, input: &str, def: &CommandDef) -> Result<(), CommandError> {
        let name = nth_token(input, 2).ok_or(CommandError::MissingArguments { usage: def.syntax })?;
        let location =
            nth_token(input, 3).ok_or(CommandError::MissingArguments { usage: def.syntax })?;
        self.event.set(name, location);
        self.sink.emit(Severity::Info, "Event data updated.");
        Ok(())
    }
}

/// Returns the nth whitespace token of the input, if present.
fn nth_token(input: &str, n: usize) -> Option<&str> {
    input.split_whitespace().nth(n)
}

/// Returns everything from the nth whitespace token onwards.
fn rest_after_token(input: &str, n: usize) -> Option<&str> {
    let token = nth_token(input, n)?;
    let offset = token.as_ptr() as usize - input.as_ptr() as usize;
    Some(input[offset..].trim_end())
}
