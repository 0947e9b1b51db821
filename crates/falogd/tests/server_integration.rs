//! Integration tests for the device server.
//!
//! These drive the full stack over real TCP connections: accept loop,
//! session workers, registry membership, the operator command router
//! and the persistence gateway seam (a recording fake here).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::sleep;

use falog_core::{
    AttendanceRow, CurrentEvent, Enrollee, PersistenceError, PersistenceGateway,
};
use falogd::registry::spawn_registry;
use falogd::router::CommandRouter;
use falogd::server::{DeviceServer, SessionState};
use falogd::sink::EventSink;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for an asynchronous condition.
const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Interval between condition checks.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Helpers
// ============================================================================

/// Waits until the condition holds, or panics after [`WAIT_TIMEOUT`].
async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < WAIT_TIMEOUT {
        if condition().await {
            return;
        }
        sleep(POLL_INTERVAL).await;
    }
    panic!("Timed out waiting for: {what}");
}

/// Gateway fake that records every call.
#[derive(Default)]
struct RecordingGateway {
    enrollments: Mutex<Vec<Enrollee>>,
    scans: Mutex<Vec<(i32, String, String)>>,
}

impl RecordingGateway {
    fn enrollments(&self) -> Vec<Enrollee> {
        self.enrollments.lock().unwrap().clone()
    }

    fn scans(&self) -> Vec<(i32, String, String)> {
        self.scans.lock().unwrap().clone()
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn init_tables(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn enroll_user(&self, enrollee: &Enrollee) -> Result<(), PersistenceError> {
        self.enrollments.lock().unwrap().push(enrollee.clone());
        Ok(())
    }

    async fn record_attendance(
        &self,
        fingerprint_id: i32,
        event_name: &str,
        event_location: &str,
    ) -> Result<String, PersistenceError> {
        self.scans.lock().unwrap().push((
            fingerprint_id,
            event_name.to_string(),
            event_location.to_string(),
        ));
        Ok("John Q Public".to_string())
    }

    async fn query_attendance_by_date(
        &self,
        _date: NaiveDate,
    ) -> Result<Vec<AttendanceRow>, PersistenceError> {
        Ok(Vec::new())
    }

    async fn query_attendance_by_event(
        &self,
        _event_name: &str,
    ) -> Result<Vec<AttendanceRow>, PersistenceError> {
        Ok(Vec::new())
    }
}

/// Full server stack bound to an ephemeral loopback port.
struct TestServer {
    server: Arc<DeviceServer>,
    router: CommandRouter,
    registry: falogd::registry::RegistryHandle,
    gateway: Arc<RecordingGateway>,
    event: CurrentEvent,
    addr: SocketAddr,
}

impl TestServer {
    async fn spawn() -> Self {
        let registry = spawn_registry();
        let gateway = Arc::new(RecordingGateway::default());
        let event = CurrentEvent::new();
        let sink = EventSink::disconnected();

        let server = Arc::new(DeviceServer::new(
            registry.clone(),
            gateway.clone(),
            sink.clone(),
            event.clone(),
        ));
        let bind_addr: SocketAddr = "127.0.0.1:0".parse().expect("loopback addr");
        let addr = server.start(bind_addr).await.expect("start server");

        let router = CommandRouter::new(
            Arc::clone(&server),
            registry.clone(),
            gateway.clone(),
            event.clone(),
            sink,
            bind_addr,
        );

        Self {
            server,
            router,
            registry,
            gateway,
            event,
            addr,
        }
    }

    /// Connects a fake scanner device.
    async fn connect(&self) -> TestDevice {
        let stream = TcpStream::connect(self.addr).await.expect("connect device");
        TestDevice::new(stream)
    }

    /// Connects a device and waits until the registry holds `expected`
    /// members, returning the newest member's name.
    async fn connect_registered(&self, expected: usize) -> (TestDevice, String) {
        let device = self.connect().await;
        let registry = self.registry.clone();
        wait_until("device to register", || {
            let registry = registry.clone();
            async move { registry.snapshot().await.len() == expected }
        })
        .await;
        let snapshot = self.registry.snapshot().await;
        let name = snapshot
            .last()
            .expect("at least one registered session")
            .name()
            .to_string();
        (device, name)
    }

    async fn shutdown(&self) {
        if !self.server.is_closed() {
            self.server.stop().await.expect("stop server");
        }
    }
}

/// Fake scanner device speaking the line protocol.
struct TestDevice {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl TestDevice {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_line(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Reads one line; `None` means the server closed the connection.
    async fn recv_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(WAIT_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("read did not complete in time")
            .expect("read line");
        if read == 0 {
            None
        } else {
            Some(line.trim_end().to_string())
        }
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn concurrent_devices_get_distinct_names() {
    let server = TestServer::spawn().await;

    let mut devices = Vec::new();
    for _ in 0..5 {
        devices.push(server.connect().await);
    }

    let registry = server.registry.clone();
    wait_until("all devices to register", || {
        let registry = registry.clone();
        async move { registry.snapshot().await.len() == 5 }
    })
    .await;

    let mut names: Vec<String> = server
        .registry
        .snapshot()
        .await
        .iter()
        .map(|h| h.name().to_string())
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 5, "every device gets a distinct name");

    server.shutdown().await;
}

#[tokio::test]
async fn device_disconnect_line_deregisters_the_session() {
    let server = TestServer::spawn().await;
    let (mut device, _name) = server.connect_registered(1).await;

    device.send_line("disconnect").await;

    let registry = server.registry.clone();
    wait_until("session to deregister", || {
        let registry = registry.clone();
        async move { registry.snapshot().await.is_empty() }
    })
    .await;

    server.shutdown().await;
}

#[tokio::test]
async fn dropped_connection_deregisters_the_session() {
    let server = TestServer::spawn().await;
    let (device, _name) = server.connect_registered(1).await;

    drop(device);

    let registry = server.registry.clone();
    wait_until("session to deregister", || {
        let registry = registry.clone();
        async move { registry.snapshot().await.is_empty() }
    })
    .await;

    server.shutdown().await;
}

#[tokio::test]
async fn registry_never_exposes_a_closed_session() {
    let server = TestServer::spawn().await;
    let (device, _name) = server.connect_registered(1).await;

    drop(device);

    // Watch the teardown: every snapshot taken while the session is
    // still a member must show it in a pre-Closed state.
    let start = tokio::time::Instant::now();
    loop {
        assert!(
            start.elapsed() < WAIT_TIMEOUT,
            "Timed out waiting for the session to deregister"
        );
        let snapshot = server.registry.snapshot().await;
        for member in &snapshot {
            assert_ne!(
                member.state(),
                SessionState::Closed,
                "registry exposed a Closed member: {}",
                member.name()
            );
        }
        if snapshot.is_empty() {
            break;
        }
        sleep(POLL_INTERVAL).await;
    }

    server.shutdown().await;
}

// ============================================================================
// Enrollment Tests
// ============================================================================

#[tokio::test]
async fn device_enrollment_reaches_the_gateway() {
    let server = TestServer::spawn().await;
    let (mut device, _name) = server.connect_registered(1).await;

    device.send_line("enrollFinger").await;
    for field in ["John", "Q", "Public", "30", "Male", "09171234567", "123 Main St", "7"] {
        device.send_line(field).await;
    }

    let gateway = server.gateway.clone();
    wait_until("enrollment to reach the gateway", || {
        let gateway = gateway.clone();
        async move { !gateway.enrollments().is_empty() }
    })
    .await;

    let enrollments = server.gateway.enrollments();
    assert_eq!(enrollments.len(), 1);
    let e = &enrollments[0];
    assert_eq!(e.full_name, "John Q Public");
    assert_eq!(e.age, 30);
    assert_eq!(e.fingerprint_id, 7);
    assert_eq!(e.address, "123 Main St");

    // The session survives the upload.
    assert_eq!(server.registry.snapshot().await.len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn truncated_enrollment_closes_the_session_without_a_write() {
    let server = TestServer::spawn().await;
    let (mut device, _name) = server.connect_registered(1).await;

    device.send_line("enrollFinger").await;
    device.send_line("John").await;
    device.send_line("Q").await;
    drop(device);

    let registry = server.registry.clone();
    wait_until("session to deregister", || {
        let registry = registry.clone();
        async move { registry.snapshot().await.is_empty() }
    })
    .await;
    assert!(server.gateway.enrollments().is_empty(), "no partial enrollment is stored");

    server.shutdown().await;
}

#[tokio::test]
async fn enroll_command_sends_the_payload_to_the_device() {
    let server = TestServer::spawn().await;
    let (mut device, name) = server.connect_registered(1).await;

    server.router.submit_enrollment(Enrollee::new(
        "Jane",
        "R",
        "Doe",
        25,
        "Female",
        "09179876543",
        "456 Side St",
        12,
    ));
    server
        .router
        .route(&format!("enroll {name}"))
        .await
        .expect("enroll command");

    let expected = [
        "enroll",
        "12",
        "Jane",
        "R",
        "Doe",
        "25",
        "Female",
        "09179876543",
        "456 Side St",
    ];
    for want in expected {
        let got = device.recv_line().await.expect("enroll payload line");
        assert_eq!(got, want);
    }

    server.shutdown().await;
}

#[tokio::test]
async fn enroll_without_staged_data_sends_nothing() {
    let server = TestServer::spawn().await;
    let (mut device, name) = server.connect_registered(1).await;

    server
        .router
        .route(&format!("enroll {name}"))
        .await
        .expect("enroll without staged data is not a router error");

    // The next thing the device sees must be the shutdown disconnect,
    // not an enroll payload.
    server.shutdown().await;
    assert_eq!(device.recv_line().await.as_deref(), Some("disconnect"));
}

// ============================================================================
// Scan Tests
// ============================================================================

#[tokio::test]
async fn scan_records_attendance_against_the_current_event() {
    let server = TestServer::spawn().await;
    server.event.set("Orientation", "Main-Hall");

    let (mut device, _name) = server.connect_registered(1).await;
    device.send_line("scanFinger").await;
    device.send_line("7").await;

    let gateway = server.gateway.clone();
    wait_until("scan to reach the gateway", || {
        let gateway = gateway.clone();
        async move { !gateway.scans().is_empty() }
    })
    .await;

    assert_eq!(
        server.gateway.scans(),
        vec![(7, "Orientation".to_string(), "Main-Hall".to_string())]
    );

    server.shutdown().await;
}

// ============================================================================
// Operator Command Tests
// ============================================================================

#[tokio::test]
async fn operator_disconnect_notifies_the_device() {
    let server = TestServer::spawn().await;
    let (mut device, name) = server.connect_registered(1).await;

    server
        .router
        .route(&format!("disconnect {name}"))
        .await
        .expect("disconnect command");

    assert_eq!(device.recv_line().await.as_deref(), Some("disconnect"));
    assert_eq!(device.recv_line().await, None, "connection is closed after the notice");

    let registry = server.registry.clone();
    wait_until("session to deregister", || {
        let registry = registry.clone();
        async move { registry.snapshot().await.is_empty() }
    })
    .await;

    server.shutdown().await;
}

#[tokio::test]
async fn reboot_command_reaches_the_device() {
    let server = TestServer::spawn().await;
    let (mut device, name) = server.connect_registered(1).await;

    server
        .router
        .route(&format!("reboot {name}"))
        .await
        .expect("reboot command");

    assert_eq!(device.recv_line().await.as_deref(), Some("reboot"));

    server.shutdown().await;
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn stop_disconnects_every_device_before_returning() {
    let server = TestServer::spawn().await;

    let mut devices = Vec::new();
    for i in 1..=3 {
        let (device, _name) = server.connect_registered(i).await;
        devices.push(device);
    }

    server.server.stop().await.expect("stop server");

    // stop() returns only after every session has run its exit path.
    assert!(server.server.is_closed());
    assert!(server.registry.snapshot().await.is_empty());

    for mut device in devices {
        assert_eq!(device.recv_line().await.as_deref(), Some("disconnect"));
        assert_eq!(device.recv_line().await, None);
    }
}

#[tokio::test]
async fn stopped_server_refuses_new_connections() {
    let server = TestServer::spawn().await;
    let addr = server.addr;
    server.server.stop().await.expect("stop server");

    assert!(
        TcpStream::connect(addr).await.is_err(),
        "listener is gone after stop"
    );
}
