use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Deterministic timestamp for tests (2024-05-21T08:00:00Z, 13:30 at +05:30).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_716_278_400;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

//
// ─── DATE KEY ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid date key: {raw}")]
pub struct ParseDateKeyError {
    raw: String,
}

/// A quiz day, printed as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(NaiveDate);

impl DateKey {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The digits of the ISO date as one integer: `2024-05-21` → `20240521`.
    ///
    /// Every caller asking for the same day gets the same seed, which is what
    /// keeps the question set identical across users.
    #[must_use]
    pub fn seed(&self) -> u64 {
        use chrono::Datelike;

        let year = u64::try_from(self.0.year()).unwrap_or(0);
        year * 10_000 + u64::from(self.0.month()) * 100 + u64::from(self.0.day())
    }

    /// Signed number of days from `self` to `later`.
    #[must_use]
    pub fn days_until(&self, later: DateKey) -> i64 {
        (later.0 - self.0).num_days()
    }

    #[must_use]
    pub fn next(&self) -> DateKey {
        Self(self.0.succ_opt().unwrap_or(NaiveDate::MAX))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = ParseDateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| ParseDateKeyError { raw: s.to_owned() })
    }
}

//
// ─── DAILY SCHEDULE ────────────────────────────────────────────────────────────
//

/// Daily wall-clock boundary in a fixed UTC offset.
///
/// A quiz day starts at `reset_time` local time and lasts until the next
/// day's `reset_time`. It is named by the local date it starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    offset: FixedOffset,
    reset_time: NaiveTime,
}

impl DailySchedule {
    #[must_use]
    pub fn new(offset: FixedOffset, reset_time: NaiveTime) -> Self {
        Self { offset, reset_time }
    }

    /// Build a schedule from an offset in minutes east of UTC.
    ///
    /// Returns `None` if the offset is out of range (±24h).
    #[must_use]
    pub fn from_offset_minutes(minutes: i32, reset_time: NaiveTime) -> Option<Self> {
        let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
        Some(Self::new(offset, reset_time))
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    #[must_use]
    pub fn reset_time(&self) -> NaiveTime {
        self.reset_time
    }

    fn reset_shift(&self) -> Duration {
        Duration::seconds(i64::from(self.reset_time.num_seconds_from_midnight()))
    }

    /// The quiz day an instant falls into.
    #[must_use]
    pub fn quiz_day(&self, at: DateTime<Utc>) -> DateKey {
        let local = at.with_timezone(&self.offset).naive_local() - self.reset_shift();
        DateKey(local.date())
    }

    /// The instant at which the given quiz day begins.
    #[must_use]
    pub fn day_start(&self, day: DateKey) -> DateTime<Utc> {
        let local = day.0.and_time(self.reset_time);
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::<Utc>::from_naive_utc_and_offset(utc, Utc)
    }

    /// When a quiz completed (or failed) at `at` stops locking the user out.
    #[must_use]
    pub fn unlock_at(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        self.day_start(self.quiz_day(at).next())
    }

    /// Quiz-day distance between two instants, in the schedule's offset.
    #[must_use]
    pub fn days_between(&self, earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
        self.quiz_day(earlier).days_until(self.quiz_day(later))
    }
}

impl Default for DailySchedule {
    /// 12:30 at UTC+05:30.
    fn default() -> Self {
        let offset = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap_or_else(|| Utc.fix());
        let reset_time = NaiveTime::from_hms_opt(12, 30, 0).unwrap_or_default();
        Self { offset, reset_time }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn key(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn seed_is_iso_date_digits() {
        assert_eq!(key("2024-05-21").seed(), 20_240_521);
        assert_eq!(key("1999-01-02").seed(), 19_990_102);
    }

    #[test]
    fn date_key_display_roundtrips() {
        let k = key("2024-05-21");
        assert_eq!(k.to_string(), "2024-05-21");
        assert!("21/05/2024".parse::<DateKey>().is_err());
    }

    #[test]
    fn fixed_now_is_after_boundary() {
        let schedule = DailySchedule::default();
        assert_eq!(schedule.quiz_day(fixed_now()), key("2024-05-21"));
    }

    #[test]
    fn completion_before_boundary_unlocks_same_day() {
        let schedule = DailySchedule::default();
        // 11:00 local on the 21st belongs to the quiz day of the 20th
        let before = utc(2024, 5, 21, 5, 30);
        assert_eq!(schedule.quiz_day(before), key("2024-05-20"));
        assert_eq!(schedule.unlock_at(before), utc(2024, 5, 21, 7, 0));
    }

    #[test]
    fn completion_after_boundary_unlocks_next_day() {
        let schedule = DailySchedule::default();
        let after = utc(2024, 5, 21, 7, 0);
        assert_eq!(schedule.quiz_day(after), key("2024-05-21"));
        assert_eq!(schedule.unlock_at(after), utc(2024, 5, 22, 7, 0));
    }

    #[test]
    fn days_between_uses_quiz_days() {
        let schedule = DailySchedule::default();
        let morning = utc(2024, 5, 21, 5, 0);
        let afternoon = utc(2024, 5, 21, 8, 0);
        // Same calendar date, different quiz days.
        assert_eq!(schedule.days_between(morning, afternoon), 1);
        assert_eq!(schedule.days_between(afternoon, afternoon + Duration::hours(20)), 0);
        assert_eq!(schedule.days_between(afternoon, afternoon + Duration::days(3)), 3);
    }

    #[test]
    fn clock_advances_only_when_fixed() {
        let mut clock = fixed_clock();
        clock.advance(Duration::days(1));
        assert_eq!(clock.now(), fixed_now() + Duration::days(1));
    }
}
