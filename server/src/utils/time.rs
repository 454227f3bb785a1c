//! Time conversions between wire timestamps and storage epoch-millis

use chrono::{DateTime, TimeZone, Utc};

/// Convert a timestamp to epoch milliseconds (storage representation)
pub fn to_epoch_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert epoch milliseconds back to a UTC timestamp
///
/// Out-of-range values clamp to the epoch rather than panicking; stored
/// values are produced by `to_epoch_ms` so this only matters for corrupt rows.
pub fn from_epoch_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}

/// Current time as an RFC 3339 UTC string (second precision)
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
