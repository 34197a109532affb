//! `classification_state` row (SPEC_FULL.md §3 entity 5, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One open-or-closed classification row for an `(imei_norm, cond_name)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationState {
    /// Virtual shard of `imei_norm`, denormalized for shard-scoped queries.
    pub virt_imei_shard: u8,
    /// Canonical IMEI this row classifies.
    pub imei_norm: String,
    /// Label of the condition this row belongs to.
    pub cond_name: String,
    /// When this row was opened (the run's `start_time`).
    pub start_date: DateTime<Utc>,
    /// When this row was closed; `None` while still open.
    pub end_date: Option<DateTime<Utc>>,
    /// Date the IMEI becomes eligible for the blacklist; `None` until
    /// computed (non-blocking condition, or amnesty still in effect).
    pub block_date: Option<DateTime<Utc>>,
    /// Whether amnesty was granted for this row at insert time.
    pub amnesty_granted: bool,
}

impl ClassificationState {
    /// Whether this row is currently open (`end_date IS NULL`).
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end_date.is_none()
    }

    /// Whether, as of `as_of`, this row has crossed its grace period and
    /// should contribute to the blacklist.
    #[must_use]
    pub fn is_blacklisted_as_of(&self, as_of: DateTime<Utc>) -> bool {
        self.is_open()
            && self
                .block_date
                .is_some_and(|block_date| block_date <= as_of)
    }

    /// Whether this row is open, blocking-eligible (has a `block_date`),
    /// but hasn't crossed it yet — i.e. it belongs on the notifications list.
    #[must_use]
    pub fn is_pending_as_of(&self, as_of: DateTime<Utc>) -> bool {
        self.is_open()
            && self
                .block_date
                .is_some_and(|block_date| block_date > as_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn row(block_date: Option<DateTime<Utc>>, end_date: Option<DateTime<Utc>>) -> ClassificationState {
        ClassificationState {
            virt_imei_shard: 0,
            imei_norm: "64220297727231".to_string(),
            cond_name: "local_stolen".to_string(),
            start_date: at(2017, 1, 1),
            end_date,
            block_date,
            amnesty_granted: false,
        }
    }

    #[test]
    fn blacklisted_when_block_date_passed_and_open() {
        let r = row(Some(at(2017, 1, 1)), None);
        assert!(r.is_blacklisted_as_of(at(2017, 1, 1)));
        assert!(r.is_blacklisted_as_of(at(2017, 1, 2)));
    }

    #[test]
    fn pending_before_block_date() {
        let r = row(Some(at(2017, 1, 31)), None);
        assert!(r.is_pending_as_of(at(2017, 1, 1)));
        assert!(!r.is_blacklisted_as_of(at(2017, 1, 1)));
    }

    #[test]
    fn closed_row_is_neither() {
        let r = row(Some(at(2017, 1, 1)), Some(at(2017, 2, 1)));
        assert!(!r.is_blacklisted_as_of(at(2017, 3, 1)));
        assert!(!r.is_pending_as_of(at(2017, 3, 1)));
    }
}
