//! State reconciliation against `classification_state` (SPEC_FULL.md §4.7 step 3-4).

use crate::amnesty::AmnestyPolicy;
use chrono::{DateTime, Utc};
use dirbs_domain_conditions::Condition;
use dirbs_domain_models::classification::ClassificationState;
use std::collections::{HashMap, HashSet};

/// Outcome of reconciling one condition's matching set against its prior
/// open rows for a single run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconciliationOutcome {
    /// Newly opened rows.
    pub opened: Vec<ClassificationState>,
    /// Rows closed this run (`end_date` now set).
    pub closed: Vec<ClassificationState>,
    /// Rows that stayed open across this run, including any whose
    /// `block_date` was just populated by an amnesty window lapsing.
    pub retained: Vec<ClassificationState>,
}

/// Reconciles `matching_set` against `open_rows` (the condition's current
/// open `classification_state` rows, one per `imei_norm`) for a single run.
///
/// `shard_of` maps an `imei_norm` to its virtual shard; `observed_before`
/// reports whether an IMEI was observed on the network before an amnesty
/// cutoff date, and is only consulted when `amnesty` is configured and the
/// condition is `amnesty_eligible`.
pub fn reconcile(
    condition: &Condition,
    matching_set: &HashSet<String>,
    open_rows: &[ClassificationState],
    run_start_time: DateTime<Utc>,
    amnesty: Option<&AmnestyPolicy>,
    shard_of: impl Fn(&str) -> u8,
    observed_before_cutoff: impl Fn(&str) -> bool,
) -> ReconciliationOutcome {
    let mut by_imei: HashMap<&str, &ClassificationState> = HashMap::new();
    for row in open_rows {
        by_imei.insert(row.imei_norm.as_str(), row);
    }

    let mut outcome = ReconciliationOutcome::default();

    for imei in matching_set {
        match by_imei.get(imei.as_str()) {
            None => outcome.opened.push(open_new_row(
                condition,
                imei,
                run_start_time,
                amnesty,
                &shard_of,
                &observed_before_cutoff,
            )),
            Some(&row) => {
                outcome
                    .retained
                    .push(maybe_lift_amnesty(row.clone(), condition, run_start_time, amnesty));
            }
        }
    }

    for row in open_rows {
        if matching_set.contains(&row.imei_norm) {
            continue;
        }
        if condition.sticky {
            outcome.retained.push(row.clone());
        } else {
            let mut closed = row.clone();
            closed.end_date = Some(run_start_time);
            outcome.closed.push(closed);
        }
    }

    outcome
}

fn open_new_row(
    condition: &Condition,
    imei_norm: &str,
    run_start_time: DateTime<Utc>,
    amnesty: Option<&AmnestyPolicy>,
    shard_of: &impl Fn(&str) -> u8,
    observed_before_cutoff: &impl Fn(&str) -> bool,
) -> ClassificationState {
    let amnesty_granted = condition.amnesty_eligible
        && amnesty
            .as_ref()
            .is_some_and(|_| observed_before_cutoff(imei_norm));

    let block_date = if !condition.blocking || amnesty_granted {
        None
    } else {
        Some(run_start_time + chrono::Duration::days(i64::from(condition.grace_period_days)))
    };

    ClassificationState {
        virt_imei_shard: shard_of(imei_norm),
        imei_norm: imei_norm.to_string(),
        cond_name: condition.label.clone(),
        start_date: run_start_time,
        end_date: None,
        block_date,
        amnesty_granted,
    }
}

/// Once an amnesty-granted row's window has lapsed, its grace countdown
/// starts from the amnesty end date rather than the original `start_date`.
fn maybe_lift_amnesty(
    row: ClassificationState,
    condition: &Condition,
    run_start_time: DateTime<Utc>,
    amnesty: Option<&AmnestyPolicy>,
) -> ClassificationState {
    let mut row = row;
    if row.amnesty_granted && row.block_date.is_none() && condition.blocking {
        if let Some(policy) = amnesty {
            if policy.has_ended(run_start_time) {
                row.block_date = Some(
                    policy.amnesty_end_date
                        + chrono::Duration::days(i64::from(condition.grace_period_days)),
                );
            }
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dirbs_domain_conditions::{Dimension, DimensionKind};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn condition(grace_days: u32, sticky: bool, amnesty_eligible: bool) -> Condition {
        Condition {
            label: "local_stolen".to_string(),
            grace_period_days: grace_days,
            blocking: true,
            sticky,
            reason: "local_stolen".to_string(),
            max_allowed_matching_ratio: 1.0,
            amnesty_eligible,
            dimensions: vec![Dimension {
                kind: DimensionKind::Stolen,
                invert: false,
            }],
        }
    }

    fn no_shard(_: &str) -> u8 {
        0
    }

    fn never_observed(_: &str) -> bool {
        false
    }

    #[test]
    fn stolen_happy_path_opens_row_with_immediate_block_date() {
        let cond = condition(0, false, false);
        let matching: HashSet<String> = ["64220297727231".to_string()].into_iter().collect();
        let outcome = reconcile(
            &cond,
            &matching,
            &[],
            at(2017, 1, 1),
            None,
            no_shard,
            never_observed,
        );
        assert_eq!(outcome.opened.len(), 1);
        assert_eq!(outcome.opened[0].block_date, Some(at(2017, 1, 1)));
        assert!(outcome.closed.is_empty());
    }

    #[test]
    fn grace_period_defers_block_date() {
        let cond = condition(30, false, false);
        let matching: HashSet<String> = ["64220297727231".to_string()].into_iter().collect();
        let outcome = reconcile(
            &cond,
            &matching,
            &[],
            at(2017, 1, 1),
            None,
            no_shard,
            never_observed,
        );
        assert_eq!(outcome.opened[0].block_date, Some(at(2017, 1, 31)));
    }

    #[test]
    fn matching_and_already_open_is_a_noop() {
        let cond = condition(0, false, false);
        let existing = ClassificationState {
            virt_imei_shard: 0,
            imei_norm: "A".to_string(),
            cond_name: "local_stolen".to_string(),
            start_date: at(2017, 1, 1),
            end_date: None,
            block_date: Some(at(2017, 1, 1)),
            amnesty_granted: false,
        };
        let matching: HashSet<String> = ["A".to_string()].into_iter().collect();
        let outcome = reconcile(
            &cond,
            &matching,
            &[existing.clone()],
            at(2017, 2, 1),
            None,
            no_shard,
            never_observed,
        );
        assert_eq!(outcome.retained, vec![existing]);
        assert!(outcome.opened.is_empty());
    }

    #[test]
    fn sticky_unmatch_preserves_open_row() {
        let cond = condition(0, true, false);
        let existing = ClassificationState {
            virt_imei_shard: 0,
            imei_norm: "A".to_string(),
            cond_name: "local_stolen".to_string(),
            start_date: at(2017, 1, 1),
            end_date: None,
            block_date: Some(at(2017, 1, 1)),
            amnesty_granted: false,
        };
        let outcome = reconcile(
            &cond,
            &HashSet::new(),
            &[existing.clone()],
            at(2017, 2, 1),
            None,
            no_shard,
            never_observed,
        );
        assert_eq!(outcome.retained, vec![existing]);
        assert!(outcome.closed.is_empty());
    }

    #[test]
    fn non_sticky_unmatch_closes_the_row() {
        let cond = condition(0, false, false);
        let existing = ClassificationState {
            virt_imei_shard: 0,
            imei_norm: "A".to_string(),
            cond_name: "local_stolen".to_string(),
            start_date: at(2017, 1, 1),
            end_date: None,
            block_date: Some(at(2017, 1, 1)),
            amnesty_granted: false,
        };
        let outcome = reconcile(
            &cond,
            &HashSet::new(),
            &[existing],
            at(2017, 2, 1),
            None,
            no_shard,
            never_observed,
        );
        assert_eq!(outcome.closed.len(), 1);
        assert_eq!(outcome.closed[0].end_date, Some(at(2017, 2, 1)));
    }

    #[test]
    fn amnesty_eligible_imei_observed_before_cutoff_defers_block_date() {
        let cond = condition(0, false, true);
        let policy = AmnestyPolicy {
            cutoff_date: at(2016, 1, 1),
            amnesty_end_date: at(2017, 6, 1),
        };
        let matching: HashSet<String> = ["A".to_string()].into_iter().collect();
        let outcome = reconcile(
            &cond,
            &matching,
            &[],
            at(2017, 1, 1),
            Some(&policy),
            no_shard,
            |_| true,
        );
        assert!(outcome.opened[0].amnesty_granted);
        assert_eq!(outcome.opened[0].block_date, None);
    }

    #[test]
    fn amnesty_lapses_and_grace_countdown_resumes() {
        let cond = condition(10, false, true);
        let policy = AmnestyPolicy {
            cutoff_date: at(2016, 1, 1),
            amnesty_end_date: at(2017, 6, 1),
        };
        let amnestied_row = ClassificationState {
            virt_imei_shard: 0,
            imei_norm: "A".to_string(),
            cond_name: "local_stolen".to_string(),
            start_date: at(2017, 1, 1),
            end_date: None,
            block_date: None,
            amnesty_granted: true,
        };
        let matching: HashSet<String> = ["A".to_string()].into_iter().collect();
        let outcome = reconcile(
            &cond,
            &matching,
            &[amnestied_row],
            at(2017, 6, 2),
            Some(&policy),
            no_shard,
            |_| true,
        );
        assert_eq!(outcome.retained[0].block_date, Some(at(2017, 6, 11)));
    }
}
