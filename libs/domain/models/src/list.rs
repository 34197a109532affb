//! Listgen output row types (SPEC_FULL.md §3 entity 6, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delta classification of a listgen output row against a base run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeltaReason {
    /// Row did not exist (for this operator/list type) at the base run.
    New,
    /// Row existed at the base run and no longer exists.
    Resolved,
    /// Row exists in both runs but its reasons or block_date differ.
    Changed,
    /// Row moved from the notifications list to the blacklist.
    Blacklisted,
    /// Row dropped off the notifications list due to no recent observation.
    NoLongerSeen,
}

/// One blacklist row: an IMEI blocked today by at least one blocking condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlacklistRow {
    /// The blocked IMEI.
    pub imei_norm: String,
    /// Date the IMEI became (or becomes) eligible for blocking.
    pub block_date: DateTime<Utc>,
    /// Sorted, deduplicated labels of every blocking condition contributing.
    pub reasons: Vec<String>,
    /// Run id in which this row first appeared.
    pub start_run_id: i64,
    /// Run id in which this row disappeared; `None` while live.
    pub end_run_id: Option<i64>,
    /// Delta classification against the base run, computed at output time.
    pub delta_reason: Option<DeltaReason>,
}

/// One notifications-list row: an IMEI to be blocked in the future,
/// paired with an observed subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRow {
    /// The prospectively blocked IMEI.
    pub imei_norm: String,
    /// Observed IMSI paired with `imei_norm` on this operator.
    pub imsi: String,
    /// Observed MSISDN paired with `imei_norm` on this operator.
    pub msisdn: String,
    /// Prospective block date (always in the future relative to the run).
    pub block_date: DateTime<Utc>,
    /// Sorted, deduplicated labels of every contributing condition.
    pub reasons: Vec<String>,
    /// Run id in which this row first appeared.
    pub start_run_id: i64,
    /// Run id in which this row disappeared; `None` while live.
    pub end_run_id: Option<i64>,
    /// Delta classification against the base run, computed at output time.
    pub delta_reason: Option<DeltaReason>,
}

/// One exceptions-list row: an `(imei, imsi)` pair exempted from blocking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionRow {
    /// Exempted IMEI.
    pub imei_norm: String,
    /// Paired IMSI from the live pairing list.
    pub imsi: String,
    /// Run id in which this row first appeared.
    pub start_run_id: i64,
    /// Run id in which this row disappeared; `None` while live.
    pub end_run_id: Option<i64>,
    /// Delta classification against the base run, computed at output time.
    pub delta_reason: Option<DeltaReason>,
}

/// Sort key contract from SPEC_FULL.md §4.8: `imei_norm, imsi, msisdn`.
pub trait ListSortKey {
    /// Returns the `(imei_norm, imsi, msisdn)` tuple this row sorts by;
    /// rows without an imsi/msisdn sort as if those fields were empty.
    fn sort_key(&self) -> (&str, &str, &str);
}

impl ListSortKey for BlacklistRow {
    fn sort_key(&self) -> (&str, &str, &str) {
        (&self.imei_norm, "", "")
    }
}

impl ListSortKey for NotificationRow {
    fn sort_key(&self) -> (&str, &str, &str) {
        (&self.imei_norm, &self.imsi, &self.msisdn)
    }
}

impl ListSortKey for ExceptionRow {
    fn sort_key(&self) -> (&str, &str, &str) {
        (&self.imei_norm, &self.imsi, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_orders_by_imei_then_imsi_then_msisdn() {
        let mut rows = vec![
            NotificationRow {
                imei_norm: "2".into(),
                imsi: "1".into(),
                msisdn: "1".into(),
                block_date: Utc::now(),
                reasons: vec![],
                start_run_id: 1,
                end_run_id: None,
                delta_reason: None,
            },
            NotificationRow {
                imei_norm: "1".into(),
                imsi: "2".into(),
                msisdn: "1".into(),
                block_date: Utc::now(),
                reasons: vec![],
                start_run_id: 1,
                end_run_id: None,
                delta_reason: None,
            },
        ];
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        assert_eq!(rows[0].imei_norm, "1");
        assert_eq!(rows[1].imei_norm, "2");
    }
}
