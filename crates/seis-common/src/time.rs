//! Time parsing shared by the metadata decoders.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parse the timestamp flavours found in QuakeML and XML-SEED documents.
///
/// Accepts RFC 3339, naive ISO 8601 with or without fractional seconds
/// (assumed UTC), and plain dates.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_datetime("2012-08-27T04:43:56.035004Z").unwrap();
        assert_eq!(dt.nanosecond(), 35_004_000);
    }

    #[test]
    fn test_parse_naive_and_date() {
        assert!(parse_datetime("2006-01-01T00:00:00").is_some());
        assert!(parse_datetime("2006-01-01T00:00:00.5").is_some());
        assert_eq!(
            parse_datetime("2006-01-01"),
            parse_datetime("2006-01-01T00:00:00")
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_datetime("").is_none());
        assert!(parse_datetime("yesterday").is_none());
    }
}
