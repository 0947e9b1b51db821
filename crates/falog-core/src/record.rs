//! Enrollment and attendance records.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A person enrolled through a fingerprint scanner.
///
/// Field order mirrors the device upload order: first_name,
/// middle_name, last_name, age, gender, phone_number, address,
/// fingerprint_id. The full name is derived once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollee {
    pub full_name: String,
    pub fingerprint_id: i32,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub age: u16,
    pub gender: String,
    pub phone_number: String,
    pub address: String,
}

impl Enrollee {
    /// Builds an enrollee from the captured fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        first_name: impl Into<String>,
        middle_name: impl Into<String>,
        last_name: impl Into<String>,
        age: u16,
        gender: impl Into<String>,
        phone_number: impl Into<String>,
        address: impl Into<String>,
        fingerprint_id: i32,
    ) -> Self {
        let first_name = first_name.into();
        let middle_name = middle_name.into();
        let last_name = last_name.into();
        let full_name = format!("{first_name} {middle_name} {last_name}");
        Self {
            full_name,
            fingerprint_id,
            first_name,
            middle_name,
            last_name,
            age,
            gender: gender.into(),
            phone_number: phone_number.into(),
            address: address.into(),
        }
    }
}

/// One attendance record as returned by the storage layer queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRow {
    pub full_name: String,
    pub date_attended: NaiveDate,
    pub time_attended: NaiveTime,
    pub event_name: String,
    pub event_location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_is_derived_from_parts() {
        let e = Enrollee::new(
            "John",
            "Q",
            "Public",
            30,
            "Male",
            "09171234567",
            "123 Main St",
            7,
        );
        assert_eq!(e.full_name, "John Q Public");
        assert_eq!(e.fingerprint_id, 7);
        assert_eq!(e.age, 30);
    }
}
