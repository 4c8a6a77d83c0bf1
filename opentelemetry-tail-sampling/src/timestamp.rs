//! Conversions from wire timestamps to elapsed microseconds.
use prost_types::Timestamp;
use std::time::{Duration, SystemTime};

const MICROS_PER_SECOND: i64 = 1_000_000;
const NANOS_PER_MICRO: i32 = 1_000;

/// Converts a wire timestamp to a count of microseconds since the epoch.
///
/// The sub-microsecond remainder is truncated, not rounded. Values outside
/// the `i64` range saturate.
///
/// # Example
///
/// ```
/// use opentelemetry_tail_sampling::timestamp::timestamp_to_micros;
/// use prost_types::Timestamp;
///
/// let ts = Timestamp { seconds: 2, nanos: 1_999 };
/// assert_eq!(timestamp_to_micros(&ts), 2_000_001);
/// ```
pub fn timestamp_to_micros(ts: &Timestamp) -> i64 {
    ts.seconds
        .saturating_mul(MICROS_PER_SECOND)
        .saturating_add(i64::from(ts.nanos / NANOS_PER_MICRO))
}

/// Converts a [`SystemTime`] to a count of microseconds since the epoch.
///
/// Times before the epoch are reported as `0`.
pub fn system_time_to_micros(time: SystemTime) -> i64 {
    let micros = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_micros();
    i64::try_from(micros).unwrap_or(i64::MAX)
}
