//! Multi-line payload assembly.
//!
//! After an `enrollFinger` or `scanFinger` keyword the device sends a
//! fixed number of payload lines in a fixed order. A short payload
//! (stream ends early) or an unparseable numeric field is a protocol
//! failure that closes the session; classification of that failure
//! lives here, the session teardown lives in the daemon.

use falog_core::Enrollee;
use thiserror::Error;

/// Number of payload lines that follow `enrollFinger`.
pub const ENROLLMENT_FIELD_COUNT: usize = 8;

/// Errors raised while assembling a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Payload ended early: got {got} of {expected} lines")]
    ShortPayload { got: usize, expected: usize },

    #[error("Invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// The eight enrollment payload lines, in upload order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentPayload {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub age: String,
    pub gender: String,
    pub phone_number: String,
    pub address: String,
    pub fingerprint_id: String,
}

impl EnrollmentPayload {
    /// Builds the payload from the raw lines.
    ///
    /// `lines` must hold the payload lines in upload order. Fewer than
    /// [`ENROLLMENT_FIELD_COUNT`] lines means the stream ended early.
    pub fn from_lines(lines: &[String]) -> Result<Self, ProtocolError> {
        if lines.len() < ENROLLMENT_FIELD_COUNT {
            return Err(ProtocolError::ShortPayload {
                got: lines.len(),
                expected: ENROLLMENT_FIELD_COUNT,
            });
        }
        Ok(Self {
            first_name: lines[0].clone(),
            middle_name: lines[1].clone(),
            last_name: lines[2].clone(),
            age: lines[3].clone(),
            gender: lines[4].clone(),
            phone_number: lines[5].clone(),
            address: lines[6].clone(),
            fingerprint_id: lines[7].clone(),
        })
    }

    /// Parses the numeric fields and produces the domain record.
    pub fn into_enrollee(self) -> Result<Enrollee, ProtocolError> {
        let age: u16 = self.age.trim().parse().map_err(|_| ProtocolError::InvalidField {
            field: "age",
            value: self.age.clone(),
        })?;
        let fingerprint_id: i32 =
            self.fingerprint_id
                .trim()
                .parse()
                .map_err(|_| ProtocolError::InvalidField {
                    field: "fingerprint_id",
                    value: self.fingerprint_id.clone(),
                })?;
        Ok(Enrollee::new(
            self.first_name,
            self.middle_name,
            self.last_name,
            age,
            self.gender,
            self.phone_number,
            self.address,
            fingerprint_id,
        ))
    }
}

/// The single payload line that follows `scanFinger`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPayload {
    pub fingerprint_id: i32,
}

impl ScanPayload {
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        let fingerprint_id = line.trim().parse().map_err(|_| ProtocolError::InvalidField {
            field: "fingerprint_id",
            value: line.to_string(),
        })?;
        Ok(Self { fingerprint_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lines() -> Vec<String> {
        ["John", "Q", "Public", "30", "Male", "09171234567", "123 Main St", "7"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn enrollment_payload_maps_fields_in_order() {
        let payload = EnrollmentPayload::from_lines(&sample_lines()).expect("complete payload");
        let enrollee = payload.into_enrollee().expect("parseable payload");
        assert_eq!(enrollee.first_name, "John");
        assert_eq!(enrollee.middle_name, "Q");
        assert_eq!(enrollee.last_name, "Public");
        assert_eq!(enrollee.age, 30);
        assert_eq!(enrollee.gender, "Male");
        assert_eq!(enrollee.phone_number, "09171234567");
        assert_eq!(enrollee.address, "123 Main St");
        assert_eq!(enrollee.fingerprint_id, 7);
        assert_eq!(enrollee.full_name, "John Q Public");
    }

    #[test]
    fn short_payload_is_rejected() {
        let mut lines = sample_lines();
        lines.truncate(5);
        let err = EnrollmentPayload::from_lines(&lines).unwrap_err();
        assert_eq!(err, ProtocolError::ShortPayload { got: 5, expected: 8 });
    }

    #[test]
    fn non_numeric_age_is_rejected() {
        let mut lines = sample_lines();
        lines[3] = "thirty".to_string();
        let payload = EnrollmentPayload::from_lines(&lines).expect("complete payload");
        assert!(matches!(
            payload.into_enrollee(),
            Err(ProtocolError::InvalidField { field: "age", .. })
        ));
    }

    #[test]
    fn scan_payload_parses_id() {
        assert_eq!(ScanPayload::from_line("42").unwrap().fingerprint_id, 42);
        assert!(ScanPayload::from_line("abc").is_err());
    }
}
