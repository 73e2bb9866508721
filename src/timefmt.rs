//! Fixed timestamp formats used at the storage boundary.
//!
//! Creation and visit entry times are stored as `DD-MM-YYYY.hh:mm:ss`,
//! expiry times as `DD-MM-YYYY.hh:mm` (no seconds). The strings must stay
//! bit-exact for compatibility, so they are only ever produced and consumed
//! here; every comparison parses into a `NaiveDateTime` first. Never compare
//! the raw strings lexicographically.

use chrono::{Local, NaiveDateTime};

use crate::error::Error;

pub const ENTRY_FORMAT: &str = "%d-%m-%Y.%H:%M:%S";
pub const EXPIRY_FORMAT: &str = "%d-%m-%Y.%H:%M";

/// HTML `datetime-local` input format, accepted from form-driven callers.
const HTML_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Current wall-clock time, second precision.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn format_entry(t: NaiveDateTime) -> String {
    t.format(ENTRY_FORMAT).to_string()
}

pub fn format_expiry(t: NaiveDateTime) -> String {
    t.format(EXPIRY_FORMAT).to_string()
}

pub fn parse_entry(s: &str) -> Result<NaiveDateTime, Error> {
    NaiveDateTime::parse_from_str(s, ENTRY_FORMAT).map_err(|_| Error::MalformedTimestamp)
}

pub fn parse_expiry(s: &str) -> Result<NaiveDateTime, Error> {
    NaiveDateTime::parse_from_str(s, EXPIRY_FORMAT).map_err(|_| Error::MalformedTimestamp)
}

/// Strict expiry-format validator: accepts exactly `DD-MM-YYYY.hh:mm`.
pub fn check_expiry_format(s: &str) -> bool {
    parse_expiry(s).is_ok()
}

/// Convert an HTML `datetime-local` value (`YYYY-MM-DDThh:mm`) into the
/// expiry format.
pub fn convert_html_datetime(s: &str) -> Result<String, Error> {
    NaiveDateTime::parse_from_str(s, HTML_DATETIME_FORMAT)
        .map(format_expiry)
        .map_err(|_| Error::MalformedTimestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 42)
            .unwrap()
    }

    #[test]
    fn entry_format_is_zero_padded_with_seconds() {
        assert_eq!(format_entry(sample()), "07-03-2024.09:05:42");
    }

    #[test]
    fn expiry_format_drops_seconds() {
        assert_eq!(format_expiry(sample()), "07-03-2024.09:05");
    }

    #[test]
    fn entry_round_trips() {
        let s = format_entry(sample());
        assert_eq!(parse_entry(&s).unwrap(), sample());
    }

    #[test]
    fn check_expiry_format_accepts_exact_shape() {
        assert!(check_expiry_format("01-12-2030.23:59"));
        assert!(check_expiry_format("31-01-2025.00:00"));
    }

    #[test]
    fn check_expiry_format_rejects_other_shapes() {
        assert!(!check_expiry_format("2030-12-01.23:59"));
        assert!(!check_expiry_format("01-12-2030.23:59:59"));
        assert!(!check_expiry_format("01-12-2030"));
        assert!(!check_expiry_format("32-01-2030.10:00"));
        assert!(!check_expiry_format(""));
    }

    #[test]
    fn html_datetime_converts_to_expiry_format() {
        assert_eq!(
            convert_html_datetime("2024-03-07T09:05").unwrap(),
            "07-03-2024.09:05"
        );
        assert!(convert_html_datetime("07-03-2024.09:05").is_err());
    }
}
