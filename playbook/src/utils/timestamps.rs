//! Timestamp utilities for templates and progress snapshots.

use chrono::{DateTime, SecondsFormat, Utc};

/// Returns the current UTC time as an ISO 8601 string with millisecond
/// precision and a `Z` suffix.
///
/// The format is `YYYY-MM-DDTHH:MM:SS.mmmZ`, the value of the `now` token.
///
/// # Examples
///
/// ```
/// use playbook::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with('Z'));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso(&Utc::now())
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn format_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Returns the current UTC date as `YYYY-MM-DD`.
#[must_use]
pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Returns milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_iso_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_iso(&ts), "2024-03-09T14:05:07.000Z");
    }

    #[test]
    fn test_today_shape() {
        let day = today();
        assert_eq!(day.len(), 10);
        assert_eq!(day.matches('-').count(), 2);
    }

    #[test]
    fn test_epoch_millis_is_recent() {
        // 2020-01-01 in millis
        assert!(epoch_millis() > 1_577_836_800_000);
    }
}
