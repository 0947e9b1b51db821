//! Persistence gateway seam.
//!
//! The daemon never talks SQL. Enrollment and attendance writes, and
//! the export queries, all go through this trait; the storage layer
//! behind it is external to this workspace and must use parameterized
//! statements only.

use crate::record::{AttendanceRow, Enrollee};
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// A storage operation failed.
///
/// Gateway failures are local: a failed enroll or scan is logged as
/// ERROR and the session keeps running, a failed query is reported to
/// the operator and the router returns.
#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Write failed: {0}")]
    Write(String),
}

/// Interface the core calls into the external storage layer.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Creates the backing tables if they do not exist.
    async fn init_tables(&self) -> Result<(), PersistenceError>;

    /// Stores a newly enrolled person.
    async fn enroll_user(&self, enrollee: &Enrollee) -> Result<(), PersistenceError>;

    /// Resolves a fingerprint id and records attendance against the
    /// given event. Returns the full name of the matched person.
    async fn record_attendance(
        &self,
        fingerprint_id: i32,
        event_name: &str,
        event_location: &str,
    ) -> Result<String, PersistenceError>;

    /// All attendance records for one calendar date.
    async fn query_attendance_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRow>, PersistenceError>;

    /// All attendance records for one event name.
    async fn query_attendance_by_event(
        &self,
        event_name: &str,
    ) -> Result<Vec<AttendanceRow>, PersistenceError>;
}
