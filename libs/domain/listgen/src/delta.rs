//! Delta computation against a base run (SPEC_FULL.md §4.8), resolving
//! the `changed` reason per list type as decided in DESIGN.md: for
//! blacklist/notifications, `reasons` or `block_date` differing; for
//! exceptions, the paired `imsi` changing.

use dirbs_domain_models::list::{BlacklistRow, DeltaReason, ExceptionRow, NotificationRow};
use std::collections::HashMap;

/// Blacklist rows annotated with their delta classification against
/// `base`, plus synthesized `resolved` rows for base entries no longer
/// present. The returned vector is the delta-form output; the full-form
/// output is `current` unannotated (or with `delta_reason` ignored).
#[must_use]
pub fn delta_blacklist(
    current: &[BlacklistRow],
    base: &[BlacklistRow],
    run_id: i64,
) -> Vec<BlacklistRow> {
    let base_by_imei: HashMap<&str, &BlacklistRow> =
        base.iter().map(|r| (r.imei_norm.as_str(), r)).collect();
    let current_imeis: std::collections::HashSet<&str> =
        current.iter().map(|r| r.imei_norm.as_str()).collect();

    let mut delta = Vec::new();
    for row in current {
        match base_by_imei.get(row.imei_norm.as_str()) {
            None => delta.push(with_reason(row.clone(), DeltaReason::New)),
            Some(prior) => {
                if prior.reasons != row.reasons || prior.block_date != row.block_date {
                    delta.push(with_reason(row.clone(), DeltaReason::Changed));
                }
            }
        }
    }
    for prior in base {
        if !current_imeis.contains(prior.imei_norm.as_str()) {
            let mut resolved = prior.clone();
            resolved.end_run_id = Some(run_id);
            delta.push(with_reason(resolved, DeltaReason::Resolved));
        }
    }
    delta
}

/// Notifications delta. A base notification whose IMEI is now on the
/// current blacklist transitions with `blacklisted`; one whose IMEI
/// dropped off both notifications and blacklist transitions with
/// `no_longer_seen`.
#[must_use]
pub fn delta_notifications(
    current: &[NotificationRow],
    base: &[NotificationRow],
    current_blacklist: &[BlacklistRow],
    run_id: i64,
) -> Vec<NotificationRow> {
    let base_by_key: HashMap<(&str, &str), &NotificationRow> = base
        .iter()
        .map(|r| ((r.imei_norm.as_str(), r.imsi.as_str()), r))
        .collect();
    let current_keys: std::collections::HashSet<(&str, &str)> = current
        .iter()
        .map(|r| (r.imei_norm.as_str(), r.imsi.as_str()))
        .collect();
    let blacklisted_imeis: std::collections::HashSet<&str> = current_blacklist
        .iter()
        .map(|r| r.imei_norm.as_str())
        .collect();

    let mut delta = Vec::new();
    for row in current {
        match base_by_key.get(&(row.imei_norm.as_str(), row.imsi.as_str())) {
            None => delta.push(with_notification_reason(row.clone(), DeltaReason::New)),
            Some(prior) => {
                if prior.reasons != row.reasons || prior.block_date != row.block_date {
                    delta.push(with_notification_reason(row.clone(), DeltaReason::Changed));
                }
            }
        }
    }
    for prior in base {
        let key = (prior.imei_norm.as_str(), prior.imsi.as_str());
        if current_keys.contains(&key) {
            continue;
        }
        let reason = if blacklisted_imeis.contains(prior.imei_norm.as_str()) {
            DeltaReason::Blacklisted
        } else {
            DeltaReason::NoLongerSeen
        };
        let mut vanished = prior.clone();
        vanished.end_run_id = Some(run_id);
        delta.push(with_notification_reason(vanished, reason));
    }
    delta
}

/// Exceptions delta. `changed` fires when the same `imei_norm` pairs
/// with a different `imsi` between runs (a pairing swap).
#[must_use]
pub fn delta_exceptions(
    current: &[ExceptionRow],
    base: &[ExceptionRow],
    run_id: i64,
) -> Vec<ExceptionRow> {
    let base_by_imei: HashMap<&str, &ExceptionRow> =
        base.iter().map(|r| (r.imei_norm.as_str(), r)).collect();
    let current_imeis: std::collections::HashSet<&str> =
        current.iter().map(|r| r.imei_norm.as_str()).collect();

    let mut delta = Vec::new();
    for row in current {
        match base_by_imei.get(row.imei_norm.as_str()) {
            None => delta.push(with_exception_reason(row.clone(), DeltaReason::New)),
            Some(prior) => {
                if prior.imsi != row.imsi {
                    delta.push(with_exception_reason(row.clone(), DeltaReason::Changed));
                }
            }
        }
    }
    for prior in base {
        if !current_imeis.contains(prior.imei_norm.as_str()) {
            let mut resolved = prior.clone();
            resolved.end_run_id = Some(run_id);
            delta.push(with_exception_reason(resolved, DeltaReason::Resolved));
        }
    }
    delta
}

fn with_reason(mut row: BlacklistRow, reason: DeltaReason) -> BlacklistRow {
    row.delta_reason = Some(reason);
    row
}

fn with_notification_reason(mut row: NotificationRow, reason: DeltaReason) -> NotificationRow {
    row.delta_reason = Some(reason);
    row
}

fn with_exception_reason(mut row: ExceptionRow, reason: DeltaReason) -> ExceptionRow {
    row.delta_reason = Some(reason);
    row
}

/// Whether a delta run's combined size exceeds `max_variance_ratio` of
/// `previous_total`, the listgen sanity check from SPEC_FULL.md §4.8.
/// A `previous_total` of zero never triggers the check (nothing to
/// compare against).
#[must_use]
pub fn exceeds_sanity_variance(delta_len: usize, previous_total: usize, max_variance_ratio: f64) -> bool {
    if previous_total == 0 {
        return false;
    }
    (delta_len as f64 / previous_total as f64) > max_variance_ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn blacklist_row(imei: &str, block_date: chrono::DateTime<Utc>, reasons: &[&str]) -> BlacklistRow {
        BlacklistRow {
            imei_norm: imei.to_string(),
            block_date,
            reasons: reasons.iter().map(|s| s.to_string()).collect(),
            start_run_id: 1,
            end_run_id: None,
            delta_reason: None,
        }
    }

    #[test]
    fn empty_base_marks_all_rows_new() {
        let current = vec![blacklist_row("A", at(2017, 1, 1), &["local_stolen"])];
        let delta = delta_blacklist(&current, &[], 1);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].delta_reason, Some(DeltaReason::New));
    }

    #[test]
    fn identical_base_and_current_yields_empty_delta() {
        let row = blacklist_row("A", at(2017, 1, 1), &["local_stolen"]);
        let delta = delta_blacklist(&[row.clone()], &[row], 1);
        assert!(delta.is_empty());
    }

    #[test]
    fn changed_block_date_is_flagged() {
        let base = vec![blacklist_row("A", at(2017, 1, 1), &["local_stolen"])];
        let current = vec![blacklist_row("A", at(2017, 1, 2), &["local_stolen"])];
        let delta = delta_blacklist(&current, &base, 2);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].delta_reason, Some(DeltaReason::Changed));
    }

    #[test]
    fn missing_from_current_is_resolved() {
        let base = vec![blacklist_row("A", at(2017, 1, 1), &["local_stolen"])];
        let delta = delta_blacklist(&[], &base, 2);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].delta_reason, Some(DeltaReason::Resolved));
    }

    #[test]
    fn base_run_equal_to_current_run_yields_empty_delta() {
        let row = blacklist_row("A", at(2017, 1, 1), &["local_stolen"]);
        let delta = delta_blacklist(&[row.clone()], &[row], 1);
        assert!(delta.is_empty());
    }

    #[test]
    fn notification_moving_to_blacklist_is_flagged_blacklisted() {
        let base_notification = NotificationRow {
            imei_norm: "A".into(),
            imsi: "imsi-1".into(),
            msisdn: "msisdn-1".into(),
            block_date: at(2017, 1, 31),
            reasons: vec!["local_stolen".into()],
            start_run_id: 1,
            end_run_id: None,
            delta_reason: None,
        };
        let blacklist = vec![blacklist_row("A", at(2017, 1, 31), &["local_stolen"])];
        let delta = delta_notifications(&[], &[base_notification], &blacklist, 2);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].delta_reason, Some(DeltaReason::Blacklisted));
    }

    #[test]
    fn notification_dropping_off_without_blacklisting_is_no_longer_seen() {
        let base_notification = NotificationRow {
            imei_norm: "A".into(),
            imsi: "imsi-1".into(),
            msisdn: "msisdn-1".into(),
            block_date: at(2017, 1, 31),
            reasons: vec!["local_stolen".into()],
            start_run_id: 1,
            end_run_id: None,
            delta_reason: None,
        };
        let delta = delta_notifications(&[], &[base_notification], &[], 2);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].delta_reason, Some(DeltaReason::NoLongerSeen));
    }

    #[test]
    fn exception_pairing_swap_is_changed() {
        let base = vec![ExceptionRow {
            imei_norm: "A".into(),
            imsi: "imsi-1".into(),
            start_run_id: 1,
            end_run_id: None,
            delta_reason: None,
        }];
        let current = vec![ExceptionRow {
            imei_norm: "A".into(),
            imsi: "imsi-2".into(),
            start_run_id: 2,
            end_run_id: None,
            delta_reason: None,
        }];
        let delta = delta_exceptions(&current, &base, 2);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].delta_reason, Some(DeltaReason::Changed));
    }

    #[test]
    fn base_run_equal_to_current_run_yields_empty_exceptions_delta() {
        let row = ExceptionRow {
            imei_norm: "A".into(),
            imsi: "imsi-1".into(),
            start_run_id: 1,
            end_run_id: None,
            delta_reason: None,
        };
        let delta = delta_exceptions(&[row.clone()], &[row], 1);
        assert!(delta.is_empty());
    }

    #[test]
    fn sanity_variance_triggers_above_ratio() {
        assert!(exceeds_sanity_variance(9_990, 10, 0.1));
        assert!(!exceeds_sanity_variance(1, 10, 0.5));
        assert!(!exceeds_sanity_variance(100, 0, 0.1));
    }
}
