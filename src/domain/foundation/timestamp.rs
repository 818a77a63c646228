//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Adds whole calendar years.
    ///
    /// Feb 29 clamps to Feb 28 in non-leap target years.
    pub fn add_years(&self, years: u32) -> Self {
        match self.0.checked_add_months(Months::new(years.saturating_mul(12))) {
            Some(dt) => Self(dt),
            None => self.add_days(365 * i64::from(years)),
        }
    }

    /// Zero-based month of the year (January = 0).
    pub fn month0(&self) -> u32 {
        self.0.month0()
    }

    /// Fractional days elapsed since `earlier`, never negative.
    pub fn days_since(&self, earlier: &Timestamp) -> f64 {
        let secs = self.duration_since(earlier).num_seconds().max(0);
        secs as f64 / 86_400.0
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Returns `None` for values outside chrono's representable range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(rfc3339: &str) -> Timestamp {
        Timestamp::from_datetime(
            DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn add_years_keeps_calendar_date() {
        let ts = at("2024-03-15T10:30:00Z");
        let next = ts.add_years(1);
        assert_eq!(next.as_datetime().year(), 2025);
        assert_eq!(next.as_datetime().month(), 3);
        assert_eq!(next.as_datetime().day(), 15);
        assert_eq!(next.as_datetime().hour(), 10);
    }

    #[test]
    fn add_years_clamps_leap_day() {
        let ts = at("2024-02-29T00:00:00Z");
        let next = ts.add_years(1);
        assert_eq!(next.as_datetime().month(), 2);
        assert_eq!(next.as_datetime().day(), 28);
    }

    #[test]
    fn month0_is_zero_based() {
        assert_eq!(at("2024-01-10T00:00:00Z").month0(), 0);
        assert_eq!(at("2024-12-10T00:00:00Z").month0(), 11);
    }

    #[test]
    fn days_since_is_fractional_and_non_negative() {
        let start = at("2024-01-01T00:00:00Z");
        let later = at("2024-01-02T12:00:00Z");
        assert!((later.days_since(&start) - 1.5).abs() < f64::EPSILON);
        assert_eq!(start.days_since(&later), 0.0);
    }

    #[test]
    fn timestamp_unix_secs_roundtrip() {
        let ts = Timestamp::from_unix_secs(1705276800).unwrap();
        assert_eq!(ts.as_datetime().year(), 2024);
        assert_eq!(ts.as_unix_secs(), 1705276800);
    }

    #[test]
    fn timestamp_serializes_to_json() {
        let ts = at("2024-01-15T10:30:00Z");
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.contains("2024-01-15"));
    }
}
