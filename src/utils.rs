//! Small shared helpers: wall-clock access and calendar bucketing.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The UTC calendar day containing the given epoch-millisecond timestamp.
///
/// Used by the market data model to detect day rollover between ticks.
pub fn utc_day(timestamp_ms: u64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).expect("epoch is valid"))
        .date_naive()
}

/// The UTC hour of day (0-23) for the given epoch-millisecond timestamp.
pub fn utc_hour(timestamp_ms: u64) -> u32 {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64)
        .map(|dt| dt.hour())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn current_time_millis_is_recent() {
        let now = current_time_millis();
        // Sometime after 2020-01-01.
        assert!(now > 1_577_836_800_000);
    }

    #[test]
    fn utc_day_changes_at_midnight() {
        // 2024-03-01 23:59:59.500 UTC and half a second later.
        let before = 1_709_337_599_500u64;
        let after = before + 1_000;
        assert_ne!(utc_day(before), utc_day(after));
        assert_eq!(utc_day(before).day(), 1);
        assert_eq!(utc_day(after).day(), 2);
    }

    #[test]
    fn utc_hour_extracts_hour() {
        // 2024-03-01 13:00:00 UTC
        assert_eq!(utc_hour(1_709_298_000_000), 13);
    }
}
