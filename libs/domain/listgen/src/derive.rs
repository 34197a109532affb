//! Derivation of the three per-operator list types from classification
//! state (SPEC_FULL.md §4.8).

use crate::source::ListgenSource;
use chrono::{DateTime, Utc};
use dirbs_domain_models::classification::ClassificationState;
use dirbs_domain_models::condition::Condition;
use dirbs_domain_models::list::{BlacklistRow, ExceptionRow, NotificationRow};
use std::collections::{HashMap, HashSet};

/// Listgen-time configuration knobs named in SPEC_FULL.md §4.8.
#[derive(Debug, Clone)]
pub struct ListgenConfig {
    /// Window (in days) over which observed pairs are considered for
    /// the notifications list.
    pub lookback_days: u32,
    /// When true, the exceptions list only includes pairs for IMEIs
    /// already on the blacklist (rather than every live pairing-list row).
    pub restrict_exceptions_list_to_blacklisted_imeis: bool,
    /// When true, barred IMEIs are added to the exceptions list output
    /// even without a live pairing-list row.
    pub augment_exceptions_with_barred_list: bool,
}

fn blocking_conditions_by_label(conditions: &[Condition]) -> HashMap<&str, &Condition> {
    conditions
        .iter()
        .filter(|c| c.blocking)
        .map(|c| (c.label.as_str(), c))
        .collect()
}

/// Groups classification rows matching `predicate` by `imei_norm`,
/// returning each group's sorted-unique reason labels and the
/// earliest (conservative) `block_date` among the group, per the
/// tie-break rule resolved in SPEC_FULL.md §4.7.
fn group_by_imei<'a>(
    rows: &'a [ClassificationState],
    blocking: &HashMap<&str, &Condition>,
    predicate: impl Fn(&ClassificationState) -> bool,
) -> Vec<(&'a str, Vec<String>, DateTime<Utc>)> {
    let mut groups: HashMap<&str, (Vec<String>, DateTime<Utc>)> = HashMap::new();
    for row in rows {
        if !blocking.contains_key(row.cond_name.as_str()) {
            continue;
        }
        if !predicate(row) {
            continue;
        }
        let Some(block_date) = row.block_date else {
            continue;
        };
        let entry = groups
            .entry(row.imei_norm.as_str())
            .or_insert_with(|| (Vec::new(), block_date));
        entry.0.push(row.cond_name.clone());
        if block_date < entry.1 {
            entry.1 = block_date;
        }
    }
    groups
        .into_iter()
        .map(|(imei, (mut reasons, block_date))| {
            reasons.sort();
            reasons.dedup();
            (imei, reasons, block_date)
        })
        .collect()
}

/// Derives the blacklist: every IMEI with at least one open blocking
/// condition whose `block_date <= run_date`.
#[must_use]
pub fn derive_blacklist(
    classification_rows: &[ClassificationState],
    conditions: &[Condition],
    run_date: DateTime<Utc>,
    run_id: i64,
) -> Vec<BlacklistRow> {
    let blocking = blocking_conditions_by_label(conditions);
    group_by_imei(classification_rows, &blocking, |row| {
        row.is_blacklisted_as_of(run_date)
    })
    .into_iter()
    .map(|(imei, reasons, block_date)| BlacklistRow {
        imei_norm: imei.to_string(),
        block_date,
        reasons,
        start_run_id: run_id,
        end_run_id: None,
        delta_reason: None,
    })
    .collect()
}

/// Derives the notifications list for `operator_id`: open blocking
/// conditions not yet past their `block_date`, joined with observed
/// pairs, excluding IMEIs live-paired with the observed IMSI unless
/// `restrict_exceptions_list_to_blacklisted_imeis` is set (in which
/// case pairing exemption applies only to already-blacklisted IMEIs,
/// so pending notifications are not exempted by it).
#[must_use]
pub fn derive_notifications(
    classification_rows: &[ClassificationState],
    conditions: &[Condition],
    source: &dyn ListgenSource,
    operator_id: &str,
    run_date: DateTime<Utc>,
    run_id: i64,
    config: &ListgenConfig,
) -> Vec<NotificationRow> {
    let blocking = blocking_conditions_by_label(conditions);
    let pending = group_by_imei(classification_rows, &blocking, |row| {
        row.is_pending_as_of(run_date)
    });

    let mut rows = Vec::new();
    for (imei, reasons, block_date) in pending {
        for (imsi, msisdn) in source.observed_pairs(operator_id, imei, config.lookback_days) {
            if !config.restrict_exceptions_list_to_blacklisted_imeis
                && source.is_live_paired(imei, &imsi)
            {
                continue;
            }
            rows.push(NotificationRow {
                imei_norm: imei.to_string(),
                imsi,
                msisdn,
                block_date,
                reasons: reasons.clone(),
                start_run_id: run_id,
                end_run_id: None,
                delta_reason: None,
            });
        }
    }
    rows
}

/// Derives the exceptions list for `operator_id` from the live pairing
/// list, optionally restricted to already-blacklisted IMEIs and
/// optionally augmented with barred IMEIs.
#[must_use]
pub fn derive_exceptions(
    source: &dyn ListgenSource,
    operator_id: &str,
    blacklisted_imeis: &HashSet<String>,
    run_id: i64,
    config: &ListgenConfig,
) -> Vec<ExceptionRow> {
    let mut seen = HashSet::new();
    let mut rows: Vec<ExceptionRow> = source
        .live_pairing_list(operator_id)
        .into_iter()
        .filter(|(imei, _)| {
            !config.restrict_exceptions_list_to_blacklisted_imeis
                || blacklisted_imeis.contains(imei)
        })
        .map(|(imei, imsi)| {
            seen.insert(imei.clone());
            ExceptionRow {
                imei_norm: imei,
                imsi,
                start_run_id: run_id,
                end_run_id: None,
                delta_reason: None,
            }
        })
        .collect();

    if config.augment_exceptions_with_barred_list {
        for imei in source.barred_imeis(operator_id) {
            if seen.insert(imei.clone()) {
                rows.push(ExceptionRow {
                    imei_norm: imei,
                    imsi: String::new(),
                    start_run_id: run_id,
                    end_run_id: None,
                    delta_reason: None,
                });
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::FixtureSource;
    use chrono::TimeZone;
    use dirbs_domain_models::condition::{Dimension, DimensionKind};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn blocking_condition(label: &str) -> Condition {
        Condition {
            label: label.to_string(),
            grace_period_days: 0,
            blocking: true,
            sticky: false,
            reason: label.to_string(),
            max_allowed_matching_ratio: 1.0,
            amnesty_eligible: false,
            dimensions: vec![Dimension {
                kind: DimensionKind::Stolen,
                invert: false,
            }],
        }
    }

    fn row(imei: &str, cond: &str, block_date: Option<DateTime<Utc>>) -> ClassificationState {
        ClassificationState {
            virt_imei_shard: 0,
            imei_norm: imei.to_string(),
            cond_name: cond.to_string(),
            start_date: at(2017, 1, 1),
            end_date: None,
            block_date,
            amnesty_granted: false,
        }
    }

    #[test]
    fn stolen_happy_path_blacklist() {
        let rows = vec![row("64220297727231", "local_stolen", Some(at(2017, 1, 1)))];
        let conds = vec![blocking_condition("local_stolen")];
        let blacklist = derive_blacklist(&rows, &conds, at(2017, 1, 1), 1);
        assert_eq!(blacklist.len(), 1);
        assert_eq!(blacklist[0].imei_norm, "64220297727231");
        assert_eq!(blacklist[0].reasons, vec!["local_stolen".to_string()]);
    }

    #[test]
    fn tie_break_uses_earliest_block_date_and_unions_reasons() {
        let rows = vec![
            row("A", "cond_x", Some(at(2017, 1, 10))),
            row("A", "cond_y", Some(at(2017, 1, 1))),
        ];
        let conds = vec![blocking_condition("cond_x"), blocking_condition("cond_y")];
        let blacklist = derive_blacklist(&rows, &conds, at(2017, 1, 10), 1);
        assert_eq!(blacklist.len(), 1);
        assert_eq!(blacklist[0].block_date, at(2017, 1, 1));
        assert_eq!(blacklist[0].reasons, vec!["cond_x".to_string(), "cond_y".to_string()]);
    }

    #[test]
    fn grace_period_keeps_imei_on_notifications_not_blacklist() {
        let rows = vec![row("A", "local_stolen", Some(at(2017, 1, 31)))];
        let conds = vec![blocking_condition("local_stolen")];
        let blacklist = derive_blacklist(&rows, &conds, at(2017, 1, 1), 1);
        assert!(blacklist.is_empty());

        let fixture = FixtureSource::default().with_observed_pair("A", "imsi-1", "msisdn-1");
        let config = ListgenConfig {
            lookback_days: 90,
            restrict_exceptions_list_to_blacklisted_imeis: false,
            augment_exceptions_with_barred_list: false,
        };
        let notifications =
            derive_notifications(&rows, &conds, &fixture, "op1", at(2017, 1, 1), 1, &config);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].block_date, at(2017, 1, 31));
    }

    #[test]
    fn live_paired_imei_excluded_from_notifications() {
        let rows = vec![row("A", "local_stolen", Some(at(2017, 1, 31)))];
        let conds = vec![blocking_condition("local_stolen")];
        let fixture = FixtureSource::default()
            .with_observed_pair("A", "imsi-1", "msisdn-1")
            .with_live_pair("A", "imsi-1");
        let config = ListgenConfig {
            lookback_days: 90,
            restrict_exceptions_list_to_blacklisted_imeis: false,
            augment_exceptions_with_barred_list: false,
        };
        let notifications =
            derive_notifications(&rows, &conds, &fixture, "op1", at(2017, 1, 1), 1, &config);
        assert!(notifications.is_empty());
    }

    #[test]
    fn exceptions_list_from_live_pairing() {
        let fixture = FixtureSource::default().with_pairing_list_entry("op1", "A", "imsi-1");
        let config = ListgenConfig {
            lookback_days: 90,
            restrict_exceptions_list_to_blacklisted_imeis: false,
            augment_exceptions_with_barred_list: false,
        };
        let exceptions = derive_exceptions(&fixture, "op1", &HashSet::new(), 1, &config);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].imei_norm, "A");
    }

    #[test]
    fn exceptions_list_restricted_to_blacklisted_imeis() {
        let fixture = FixtureSource::default()
            .with_pairing_list_entry("op1", "A", "imsi-1")
            .with_pairing_list_entry("op1", "B", "imsi-2");
        let config = ListgenConfig {
            lookback_days: 90,
            restrict_exceptions_list_to_blacklisted_imeis: true,
            augment_exceptions_with_barred_list: false,
        };
        let blacklisted: HashSet<String> = ["A".to_string()].into_iter().collect();
        let exceptions = derive_exceptions(&fixture, "op1", &blacklisted, 1, &config);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].imei_norm, "A");
    }
}
