/// Utility functions
use chrono::{DateTime, TimeZone, Utc};

/// Convert a fractional-second Unix epoch into a timestamp.
///
/// The fractional remainder can come out a hair negative after the float
/// subtraction; clamp it to zero so the nanosecond component never is.
pub fn unix_ts_to_datetime(t: f64) -> DateTime<Utc> {
    let secs = t as i64;
    let mut nanos = ((t - secs as f64) * 1_000_000_000.0) as i64;
    if nanos < 0 {
        nanos = 0;
    }
    Utc.timestamp_opt(secs, nanos as u32)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Escape a name for embedding inside a double-quoted filter-expression
/// string literal.
pub fn escape_filter_string(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build the match-by-name host filter for a bare host name. The backend
/// applies glob matching, so patterns like `web*` work too.
pub fn host_match_filter(host: &str) -> String {
    format!("match(\"{}\", host.name)", escape_filter_string(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_ts_whole_seconds() {
        let ts = unix_ts_to_datetime(1_700_000_000.0);
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_unix_ts_fractional_seconds() {
        let ts = unix_ts_to_datetime(1_700_000_000.25);
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 250_000_000);
    }

    #[test]
    fn test_unix_ts_negative_fraction_clamped() {
        // For t just below zero the truncated second is 0 and the remainder
        // is negative; it must clamp instead of underflowing.
        let ts = unix_ts_to_datetime(-0.5);
        assert_eq!(ts.timestamp(), 0);
        assert_eq!(ts.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_host_match_filter_plain_name() {
        assert_eq!(
            host_match_filter("t1-host1"),
            r#"match("t1-host1", host.name)"#
        );
    }

    #[test]
    fn test_escape_filter_string() {
        assert_eq!(escape_filter_string(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[test]
    fn test_host_match_filter_escapes_quotes() {
        // A name carrying quotes must not be able to break out of the
        // generated string literal.
        let filter = host_match_filter(r#"h1", host.name) || match("*"#);
        assert_eq!(
            filter,
            r#"match("h1\", host.name) || match(\"*", host.name)"#
        );
    }
}
