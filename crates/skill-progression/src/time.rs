//! Time utilities for the progression engine.
//!
//! All timestamps are Unix epoch microseconds (u64).

/// Microseconds in one day.
pub const MICROS_PER_DAY: u64 = 86_400 * 1_000_000;

/// Return the current time as microseconds since Unix epoch.
pub fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Add a whole number of days to a microsecond timestamp.
pub fn add_days(micros: u64, days: u32) -> u64 {
    micros.saturating_add(u64::from(days) * MICROS_PER_DAY)
}

fn to_datetime(micros: u64) -> chrono::DateTime<chrono::Utc> {
    let secs = (micros / 1_000_000) as i64;
    let nsecs = ((micros % 1_000_000) * 1000) as u32;
    chrono::DateTime::from_timestamp(secs, nsecs).unwrap_or(chrono::DateTime::UNIX_EPOCH)
}

/// Convert microseconds to an RFC 3339 string.
pub fn micros_to_rfc3339(micros: u64) -> String {
    to_datetime(micros).to_rfc3339()
}

/// Convert microseconds to a compact `YYYYMMDD` date stamp.
pub fn micros_to_date_stamp(micros: u64) -> String {
    to_datetime(micros).format("%Y%m%d").to_string()
}
