//! Date/time utilities for medgate.
//!
//! All timestamps are stored as UTC `TEXT` in the SQLite datetime format
//! so that expiry comparisons against `datetime('now')` work in SQL.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Storage format for timestamps, matching SQLite's `datetime('now')`.
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC datetime for storage.
pub fn sql_timestamp(dt: DateTime<Utc>) -> String {
    dt.format(SQL_DATETIME_FORMAT).to_string()
}

/// Compute an expiry timestamp `window` from now, formatted for storage.
pub fn expiry_timestamp(window: Duration) -> String {
    sql_timestamp(Utc::now() + window)
}

/// Parse a stored timestamp back into a UTC datetime.
///
/// Returns `None` if the string is not in the storage format.
pub fn parse_sql_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, SQL_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
