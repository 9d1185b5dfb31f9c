use chrono::{DateTime, Timelike, Utc};

/// Formats the archive object key `<prefix>_<timestamp>.<extension>`.
pub fn format_archive_key(prefix: &str, timestamp: DateTime<Utc>, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        format_utc_timestamp(timestamp),
        extension
    )
}

/// Renders `timestamp` as ISO-8601 with a `Z` suffix.
///
/// Microseconds are included only when non-zero, so a whole second renders as
/// `2024-03-01T12:30:00Z` and anything else as `2024-03-01T12:30:00.250000Z`.
pub fn format_utc_timestamp(timestamp: DateTime<Utc>) -> String {
    if timestamp.nanosecond() / 1_000 == 0 {
        timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }
}
