//! Strict date parsing for export queries.

use crate::error::DomainError;
use chrono::NaiveDate;

/// Parses a date in strict `YYYY-MM-DD` form.
///
/// The shape is checked before chrono gets to see the string: exactly
/// ten characters, digits in the 4-2-2 positions, `-` separators.
/// chrono then rejects impossible calendar dates (2024-02-30).
pub fn parse_iso_date(input: &str) -> Result<NaiveDate, DomainError> {
    let bytes = input.as_bytes();
    let well_shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit());

    if !well_shaped {
        return Err(DomainError::InvalidDateFormat {
            input: input.to_string(),
        });
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| DomainError::InvalidDateFormat {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_dates() {
        let date = parse_iso_date("2024-01-05").expect("valid date");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn rejects_wrong_field_order() {
        assert!(parse_iso_date("05-01-2024").is_err());
    }

    #[test]
    fn rejects_short_fields() {
        assert!(parse_iso_date("2024-1-5").is_err());
        assert!(parse_iso_date("2024-01-5").is_err());
    }

    #[test]
    fn rejects_impossible_calendar_dates() {
        assert!(parse_iso_date("2024-02-30").is_err());
        assert!(parse_iso_date("2024-13-01").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_iso_date("2024-01-05x").is_err());
        assert!(parse_iso_date("").is_err());
    }
}
