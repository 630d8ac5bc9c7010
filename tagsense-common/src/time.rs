//! Timestamp utilities
//!
//! Core operations take an explicit unix-seconds `now` so callers (and
//! tests) control the clock; these helpers produce it.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current unix time in whole seconds
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Date partition key (`YYYY-MM-DD`, UTC) for a unix-seconds timestamp.
///
/// Readings are partitioned by UTC date so that readers and the engine
/// in different zones agree on the partition.
pub fn date_key(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_now_ts_matches_now() {
        let ts = now_ts();
        let wall = now().timestamp();
        assert!((wall - ts).abs() <= 1);
    }

    #[test]
    fn test_date_key_epoch() {
        assert_eq!(date_key(0), "1970-01-01");
    }

    #[test]
    fn test_date_key_known_value() {
        // 2025-04-13 00:00:00 UTC
        assert_eq!(date_key(1_744_502_400), "2025-04-13");
        // one second before midnight still belongs to the previous day
        assert_eq!(date_key(1_744_502_399), "2025-04-12");
    }

    #[test]
    fn test_date_key_negative_timestamp_is_total() {
        // Out-of-range input degrades to the epoch key rather than panicking
        assert_eq!(date_key(i64::MIN), "1970-01-01");
    }
}
