//! falog daemon - fingerprint attendance log server.
//!
//! This binary hosts the device server and an operator console on
//! stdin/stdout. Devices connect over TCP; the operator types commands
//! (`start server`, `enroll <client>`, `export date <yyyy-mm-dd>`, ...)
//! and the classified console events are printed as they happen.
//!
//! # Usage
//!
//! ```bash
//! # Start the console; the server starts on `start server`
//! falogd
//!
//! # Bind address for the device listener
//! falogd --bind 0.0.0.0:7070
//!
//! # Start the device server immediately
//! falogd --start
//! ```
//!
//! Storage is an in-memory gateway; attach a real database by
//! implementing `PersistenceGateway` and swapping it in here.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::process;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use falog_core::{
    AttendanceRow, CurrentEvent, Enrollee, PersistenceError, PersistenceGateway, Severity,
};
use falogd::registry::spawn_registry;
use falogd::router::{CommandError, CommandRouter};
use falogd::server::DeviceServer;
use falogd::sink::EventSink;

/// falog daemon - fingerprint scanner server and operator console
#[derive(Parser, Debug)]
#[command(name = "falogd", version, about)]
struct Args {
    /// Address the device listener binds when the server is started
    #[arg(long, default_value = "127.0.0.1:7070")]
    bind: SocketAddr,

    /// Start the device server immediately instead of waiting for
    /// `start server`
    #[arg(long)]
    start: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("falogd=info".parse()?)
                .add_directive("falog_core=info".parse()?)
                .add_directive("falog_protocol=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        bind = %args.bind,
        "falog daemon starting"
    );

    let registry = spawn_registry();
    let gateway: Arc<dyn PersistenceGateway> = Arc::new(MemoryGateway::default());
    let event = CurrentEvent::new();
    let (sink, mut events) = EventSink::channel();

    let server = Arc::new(DeviceServer::new(
        registry.clone(),
        Arc::clone(&gateway),
        sink.clone(),
        event.clone(),
    ));
    let router = Arc::new(CommandRouter::new(
        Arc::clone(&server),
        registry,
        gateway,
        event,
        sink.clone(),
        args.bind,
    ));

    // Display surface: drain classified events to stdout.
    let display = tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            println!("{ev}");
        }
    });

    if args.start {
        if let Err(e) = router.route("start server").await {
            error!(error = %e, "failed to start device server");
            return Err(e.into());
        }
    }

    let shutdown_router = Arc::clone(&router);
    let shutdown_server = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "error waiting for shutdown signal");
        }
        info!("shutdown signal received");
        if !shutdown_server.is_closed() {
            if let Err(e) = shutdown_router.route("stop server").await {
                error!(error = %e, "error stopping server on shutdown");
            }
        }
        process::exit(0);
    });

    console_loop(&router, &sink).await;

    // stdin closed; stop the server if it is still up.
    if !server.is_closed() {
        if let Err(e) = router.route("stop server").await {
            error!(error = %e, "error stopping server on exit");
        }
    }

    // Give the display task a moment to drain, then stop it; the
    // signal task keeps a sender alive so the channel never closes.
    drop(sink);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    display.abort();

    info!("falog daemon stopped");
    Ok(())
}

/// Reads operator commands from stdin until EOF.
async fn console_loop(router: &CommandRouter, sink: &EventSink) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "error reading console input");
                return;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        sink.emit(Severity::Console, input);

        // `submit <first> <middle> <last> <age> <gender> <phone>
        // <address> <finger-id>` stages enrollment data for the next
        // `enroll <client>`; stand-in for the enrollment form.
        if let Some(rest) = input.strip_prefix("submit ") {
            match parse_submit(rest) {
                Ok(enrollee) => {
                    sink.emit(
                        Severity::Info,
                        format!("Enrollment data staged for {}", enrollee.full_name),
                    );
                    router.submit_enrollment(enrollee);
                }
                Err(msg) => sink.emit(Severity::Invalid, msg),
            }
            continue;
        }

        if let Err(e) = router.route(input).await {
            let severity = match e {
                CommandError::EmptyInput
                | CommandError::UnknownCommand
                | CommandError::MissingArguments { .. }
                | CommandError::InvalidDateFormat { .. } => Severity::Invalid,
                _ => Severity::Error,
            };
            sink.emit(severity, e.to_string());
        }
    }
}

fn parse_submit(rest: &str) -> Result<Enrollee, String> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let [first, middle, last, age, gender, phone, address, finger_id] = fields.as_slice() else {
        return Err(
            "Usage: submit <first> <middle> <last> <age> <gender> <phone> <address> <finger-id>"
                .to_string(),
        );
    };
    let age: u16 = age.parse().map_err(|_| format!("Invalid age: {age}"))?;
    let finger_id: i32 = finger_id
        .parse()
        .map_err(|_| format!("Invalid finger ID: {finger_id}"))?;
    Ok(Enrollee::new(
        *first, *middle, *last, age, *gender, *phone, *address, finger_id,
    ))
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

/// In-memory gateway backing the standalone binary.
#[derive(Default)]
struct MemoryGateway {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    enrollees: HashMap<i32, Enrollee>,
    attendance: Vec<AttendanceRow>,
}

impl MemoryGateway {
    fn locked(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn init_tables(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn enroll_user(&self, enrollee: &Enrollee) -> Result<(), PersistenceError> {
        self.locked()
            .enrollees
            .insert(enrollee.fingerprint_id, enrollee.clone());
        Ok(())
    }

    async fn record_attendance(
        &self,
        fingerprint_id: i32,
        event_name: &str,
        event_location: &str,
    ) -> Result<String, PersistenceError> {
        let now = Local::now().naive_local();
        let mut state = self.locked();
        let full_name = state
            .enrollees
            .get(&fingerprint_id)
            .map(|e| e.full_name.clone())
            .ok_or_else(|| {
                PersistenceError::Query(format!("no enrollee with finger ID {fingerprint_id}"))
            })?;
        state.attendance.push(AttendanceRow {
            full_name: full_name.clone(),
            date_attended: now.date(),
            time_attended: now.time(),
            event_name: event_name.to_string(),
            event_location: event_location.to_string(),
        });
        Ok(full_name)
    }

    async fn query_attendance_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRow>, PersistenceError> {
        Ok(self
            .locked()
            .attendance
            .iter()
            .filter(|row| row.date_attended == date)
            .cloned()
            .collect())
    }

    async fn query_attendance_by_event(
        &self,
        event_name: &str,
    ) -> Result<Vec<AttendanceRow>, PersistenceError> {
        Ok(self
            .locked()
            .attendance
            .iter()
            .filter(|row| row.event_name == event_name)
            .cloned()
            .collect())
    }
}
