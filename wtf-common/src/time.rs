//! Timestamp utilities
//!
//! Service code never reads the wall clock directly. A [`Clock`] is injected
//! and sampled once per transaction scope, so the dial row and its history
//! sample always agree on the time of a change.

use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::Mutex;

/// History bucket granularity
pub const HISTORY_BUCKET_SECS: i64 = 60;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

/// Manually driven clock for deterministic tests and replays
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    /// Move the clock to an absolute time
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Truncate a timestamp to the preceding minute boundary
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    // Zeroing seconds and nanoseconds of a valid UTC time cannot fail.
    ts.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_drops_seconds_and_subseconds() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 59).unwrap()
            + Duration::milliseconds(999);
        let bucket = truncate_to_minute(ts);
        assert_eq!(bucket, Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 0).unwrap());
    }

    #[test]
    fn test_truncate_is_identity_on_boundary() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 0).unwrap();
        assert_eq!(truncate_to_minute(ts), ts);
    }

    #[test]
    fn test_same_minute_shares_bucket() {
        let a = Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 1).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 58).unwrap();
        let c = Utc.with_ymd_and_hms(2024, 3, 9, 14, 28, 0).unwrap();
        assert_eq!(truncate_to_minute(a), truncate_to_minute(b));
        assert_ne!(truncate_to_minute(b), truncate_to_minute(c));
        assert_eq!(
            (truncate_to_minute(c) - truncate_to_minute(b)).num_seconds(),
            HISTORY_BUCKET_SECS
        );
    }

    #[test]
    fn test_fixed_clock_set_and_advance() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_returns_recent_timestamp() {
        let timestamp = SystemClock.now();
        // After 2000-01-01 and before 2100-01-01
        assert!(timestamp.timestamp() > 946_684_800);
        assert!(timestamp.timestamp() < 4_102_444_800);
    }
}
