//! ISO 8601 conversion for Time scalars with the ISO-8601 unit.
//!
//! Such scalars store seconds since the Unix epoch in numeric data types and
//! travel as ISO timestamps in text, JSON and XML.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Format epoch seconds as an ISO 8601 UTC timestamp.
///
/// Returns `None` for values outside chrono's range or NaN.
pub fn format_iso(seconds: f64) -> Option<String> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    let (whole, nanos) = if nanos >= 1_000_000_000 {
        (whole + 1.0, 0)
    } else {
        (whole, nanos)
    };
    let dt = DateTime::<Utc>::from_timestamp(whole as i64, nanos)?;
    Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Parse an ISO 8601 timestamp into epoch seconds.
///
/// Accepts RFC 3339 with offset, naive date-times (taken as UTC) and plain
/// dates.
pub fn parse_iso(s: &str) -> Option<f64> {
    let s = s.trim();
    let dt = if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        dt.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.and_utc()
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
    };
    Some(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_iso() {
        assert_eq!(format_iso(0.0).unwrap(), "1970-01-01T00:00:00Z");
        assert_eq!(format_iso(1_705_320_000.0).unwrap(), "2024-01-15T12:00:00Z");
        assert_eq!(format_iso(1.5).unwrap(), "1970-01-01T00:00:01.500Z");
        assert!(format_iso(f64::NAN).is_none());
    }

    #[test]
    fn test_parse_iso() {
        assert_eq!(parse_iso("2024-01-15T12:00:00Z"), Some(1_705_320_000.0));
        assert_eq!(parse_iso("2024-01-15T13:00:00+01:00"), Some(1_705_320_000.0));
        assert_eq!(parse_iso("2024-01-15T12:00:00"), Some(1_705_320_000.0));
        assert_eq!(parse_iso("1970-01-02"), Some(86_400.0));
        assert_eq!(parse_iso("not a time"), None);
    }

    #[test]
    fn test_round_trip_fraction() {
        let t = 1_705_320_000.25;
        assert_eq!(parse_iso(&format_iso(t).unwrap()), Some(t));
    }
}
