//! Trailing date window and per-source timestamp parsing.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Serialize;

/// Timestamp encodings used by the REST collaborators.
///
/// Each source has its own format; there is no shared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimestampFormat {
    /// `YYYY-MM-DD HH:MM:SS[.fffffffff]` in UTC. Fractional seconds are ignored.
    Gerrit,
    /// RFC 3339, e.g. `2019-06-01T12:00:00Z`.
    GitHub,
}

impl TimestampFormat {
    /// Parse a raw timestamp into a UTC instant.
    pub fn parse(self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        match self {
            Self::Gerrit => {
                let whole = raw.split('.').next().unwrap_or(raw);
                NaiveDateTime::parse_from_str(whole, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }
            Self::GitHub => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// The inclusive trailing window `[now - days, now]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    /// Window size in whole days.
    pub days: u32,
    /// The instant the window is anchored to.
    pub now: DateTime<Utc>,
}

impl DateWindow {
    /// A window ending at `now`.
    pub const fn new(days: u32, now: DateTime<Utc>) -> Self {
        Self { days, now }
    }

    /// A window ending at the current instant.
    pub fn ending_now(days: u32) -> Self {
        Self::new(days, Utc::now())
    }

    /// Whole days between `at` and `now`, floored.
    ///
    /// Timestamps in the future yield negative ages.
    pub fn age_days(&self, at: DateTime<Utc>) -> i64 {
        let delta = self.now - at;
        let days = delta.num_days();
        if delta < TimeDelta::zero() && delta != TimeDelta::days(days) {
            days - 1
        } else {
            days
        }
    }

    /// Whether an age falls inside the window. The boundary is inclusive.
    pub fn includes_age(&self, age_days: i64) -> bool {
        age_days <= i64::from(self.days)
    }

    /// The oldest instant still inside the window, for display. Windows
    /// reaching past chrono's range start at [`DateTime::<Utc>::MIN_UTC`].
    pub fn start(&self) -> DateTime<Utc> {
        TimeDelta::try_days(i64::from(self.days))
            .and_then(|span| self.now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 6, 15, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn huge_window_starts_at_earliest_instant() {
        let window = DateWindow::new(u32::MAX, now());
        assert_eq!(window.start(), DateTime::<Utc>::MIN_UTC);
        assert!(window.includes_age(window.age_days(DateTime::<Utc>::MIN_UTC)));
    }

    #[test]
    fn window_serializes_with_rfc3339_anchor() {
        let json = serde_json::to_value(DateWindow::new(7, now())).unwrap();
        assert_eq!(json["days"], 7);
        assert_eq!(json["now"], "2019-06-15T12:00:00Z");
    }

    #[test]
    fn gerrit_timestamp_with_nanoseconds() {
        let parsed = TimestampFormat::Gerrit
            .parse("2019-06-10 08:30:00.000000000")
            .unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2019, 6, 10, 8, 30, 0).single().unwrap());
    }

    #[test]
    fn gerrit_timestamp_without_fraction() {
        assert!(TimestampFormat::Gerrit.parse("2019-06-10 08:30:00").is_some());
    }

    #[test]
    fn github_timestamp_rfc3339() {
        let parsed = TimestampFormat::GitHub.parse("2019-06-10T08:30:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2019, 6, 10, 8, 30, 0).single().unwrap());
    }

    #[test]
    fn formats_are_not_interchangeable() {
        assert!(TimestampFormat::Gerrit.parse("2019-06-10T08:30:00Z").is_none());
        assert!(TimestampFormat::GitHub.parse("2019-06-10 08:30:00").is_none());
        assert!(TimestampFormat::GitHub.parse("yesterday").is_none());
    }

    #[test]
    fn age_is_floored() {
        let window = DateWindow::new(7, now());
        let almost_two_days = now() - TimeDelta::hours(47);
        assert_eq!(window.age_days(almost_two_days), 1);
        let future = now() + TimeDelta::hours(3);
        assert_eq!(window.age_days(future), -1);
        assert_eq!(window.age_days(now()), 0);
    }

    #[test]
    fn boundary_is_inclusive() {
        let window = DateWindow::new(7, now());
        assert!(window.includes_age(7));
        assert!(!window.includes_age(8));
        assert!(window.includes_age(0));

        let zero = DateWindow::new(0, now());
        assert!(zero.includes_age(0));
        assert!(!zero.includes_age(1));
    }

    #[test]
    fn start_is_days_before_now() {
        let window = DateWindow::new(3, now());
        assert_eq!(window.start(), Utc.with_ymd_and_hms(2019, 6, 12, 12, 0, 0).single().unwrap());
    }
}
