//! Safety ratio gate (SPEC_FULL.md §4.7 step 2).

use dirbs_domain_conditions::{Condition, ConditionResult};

/// A condition's matching set exceeded its configured safety ceiling.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("condition {cond_name:?} matched {ratio:.4} of observed IMEIs, exceeding max_allowed_matching_ratio {max:.4}")]
pub struct SafetyRatioExceeded {
    pub cond_name: String,
    pub ratio: f64,
    pub max: f64,
}

/// Checks `result` against `condition`'s configured ceiling. Returns
/// `Err` when exceeded; callers pass `--no-safety-check` through by
/// simply not calling this (or ignoring the error) rather than a flag
/// threaded through here, keeping this function a pure check.
pub fn check(condition: &Condition, result: &ConditionResult) -> Result<(), SafetyRatioExceeded> {
    if result.exceeds_safety_ratio(condition) {
        Err(SafetyRatioExceeded {
            cond_name: condition.label.clone(),
            ratio: result.matching_ratio,
            max: condition.max_allowed_matching_ratio,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirbs_domain_conditions::{Dimension, DimensionKind};
    use std::collections::HashSet;

    fn condition(max: f64) -> Condition {
        Condition {
            label: "local_stolen".to_string(),
            grace_period_days: 0,
            blocking: true,
            sticky: false,
            reason: "local_stolen".to_string(),
            max_allowed_matching_ratio: max,
            amnesty_eligible: false,
            dimensions: vec![Dimension {
                kind: DimensionKind::Stolen,
                invert: false,
            }],
        }
    }

    #[test]
    fn passes_within_ceiling() {
        let cond = condition(0.5);
        let result = ConditionResult {
            matching_set: HashSet::new(),
            matching_ratio: 0.1,
        };
        assert!(check(&cond, &result).is_ok());
    }

    #[test]
    fn fails_above_ceiling() {
        let cond = condition(0.1);
        let result = ConditionResult {
            matching_set: HashSet::new(),
            matching_ratio: 0.5,
        };
        let err = check(&cond, &result).unwrap_err();
        assert_eq!(err.cond_name, "local_stolen");
    }
}
