//! RFC 3339 timestamp helpers
//!
//! Every record carries UTC timestamps with millisecond precision. All
//! crates stamp time through these helpers so the on-the-wire format stays
//! identical everywhere.

use crate::{RecordError, RecordResult};
use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as an RFC 3339 UTC string, e.g. `2026-08-01T12:00:00.000Z`
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

/// Format a timestamp the way records carry it
pub fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a record timestamp back into a `DateTime<Utc>`
pub fn parse_rfc3339(input: &str) -> RecordResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RecordError::InvalidTimestamp(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_round_trips() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 12, 30, 45).unwrap();
        let s = to_rfc3339(ts);
        assert_eq!(s, "2026-08-01T12:30:45.000Z");
        assert_eq!(parse_rfc3339(&s).unwrap(), ts);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_rfc3339("yesterday").is_err());
        assert!(parse_rfc3339("").is_err());
    }

    #[test]
    fn test_parse_accepts_offsets() {
        let dt = parse_rfc3339("2026-08-01T14:30:45.000+02:00").unwrap();
        assert_eq!(to_rfc3339(dt), "2026-08-01T12:30:45.000Z");
    }
}
