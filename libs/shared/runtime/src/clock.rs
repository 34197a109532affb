//! Clock abstraction (SPEC_FULL.md §9 "no module-level singletons"):
//! every component takes a `&dyn Clock` rather than calling `Utc::now()`
//! directly, so `--curr-date` can pin "now" for classify/listgen runs
//! and tests can run without a wall-clock dependency.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant, for `--curr-date=YYYYMMDD` and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Builds a `FixedClock` at midnight UTC on `date`, the form
    /// `--curr-date=YYYYMMDD` takes.
    #[must_use]
    pub fn at_date(date: NaiveDate) -> Self {
        Self(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is always valid")))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_pinned_instant() {
        let date = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
        let clock = FixedClock::at_date(date);
        assert_eq!(clock.now().date_naive(), date);
    }
}
