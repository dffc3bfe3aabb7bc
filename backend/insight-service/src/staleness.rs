//! Refresh eligibility
//!
//! A record is due when its `next_refresh_due` has passed, or when its last
//! refresh is older than one interval. The second clause catches rows whose
//! due timestamp drifted (clock changes, missed schedules).

use chrono::{DateTime, Duration, Utc};

use crate::error::{InsightError, Result};
use crate::models::DueInsight;

/// Default refresh cadence in days
pub const DEFAULT_INTERVAL_DAYS: i64 = 7;

/// Time between successful refreshes of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshInterval(Duration);

impl RefreshInterval {
    pub fn days(days: i64) -> Result<Self> {
        if days <= 0 {
            return Err(InsightError::Config(format!(
                "refresh interval must be positive, got {} days",
                days
            )));
        }
        Ok(Self(Duration::days(days)))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn num_days(&self) -> i64 {
        self.0.num_days()
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self(Duration::days(DEFAULT_INTERVAL_DAYS))
    }
}

/// Staleness predicate
pub fn is_due(
    last_refreshed_at: DateTime<Utc>,
    next_refresh_due: DateTime<Utc>,
    now: DateTime<Utc>,
    interval: RefreshInterval,
) -> bool {
    next_refresh_due <= now || last_refreshed_at <= now - interval.as_duration()
}

/// The only way a due timestamp is derived
pub fn next_refresh_due(refreshed_at: DateTime<Utc>, interval: RefreshInterval) -> DateTime<Utc> {
    refreshed_at + interval.as_duration()
}

/// Oldest-due first, ties broken by key
pub fn order_due(mut rows: Vec<DueInsight>) -> Vec<DueInsight> {
    rows.sort_by(|a, b| {
        a.next_refresh_due
            .cmp(&b.next_refresh_due)
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert!(RefreshInterval::days(0).is_err());
        assert!(RefreshInterval::days(-3).is_err());
        assert_eq!(RefreshInterval::days(7).unwrap(), RefreshInterval::default());
    }

    #[test]
    fn test_due_when_next_refresh_passed() {
        let t = now();
        let interval = RefreshInterval::default();
        assert!(is_due(t - Duration::days(10), t - Duration::days(3), t, interval));
        assert!(is_due(t - Duration::days(1), t, t, interval));
    }

    #[test]
    fn test_due_when_last_refresh_too_old() {
        let t = now();
        let interval = RefreshInterval::default();
        // next_refresh_due is in the future but the row was last touched 8 days ago
        assert!(is_due(t - Duration::days(8), t + Duration::days(30), t, interval));
        assert!(is_due(t - Duration::days(7), t + Duration::days(1), t, interval));
    }

    #[test]
    fn test_fresh_record_not_due() {
        let t = now();
        let interval = RefreshInterval::default();
        assert!(!is_due(t - Duration::days(2), t + Duration::days(5), t, interval));
        assert!(!is_due(
            t - Duration::days(7) + Duration::seconds(1),
            t + Duration::seconds(1),
            t,
            interval
        ));
    }

    #[test]
    fn test_next_refresh_due_is_interval_after_refresh() {
        let t = now();
        assert_eq!(
            next_refresh_due(t, RefreshInterval::default()),
            t + Duration::days(7)
        );
    }

    #[test]
    fn test_order_due() {
        let t = now();
        let row = |key: &str, due_offset: i64| DueInsight {
            key: key.to_string(),
            last_refreshed_at: t - Duration::days(10),
            next_refresh_due: t + Duration::days(due_offset),
        };

        let ordered = order_due(vec![row("b", -1), row("c", -5), row("a", -1)]);
        let keys: Vec<_> = ordered.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }
}
