//! Condition evaluation: intersects a condition's dimensions' matching
//! sets (respecting each dimension's `invert` flag), and applies the
//! safety ratio check from SPEC_FULL.md §4.7.

use crate::dimensions;
use crate::source::ShardDataSource;
use dirbs_domain_models::condition::Condition;
use rayon::prelude::*;
use std::collections::HashSet;

/// Result of evaluating one condition against one shard's observed IMEIs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionResult {
    /// IMEIs matching the condition (after intersecting all dimensions).
    pub matching_set: HashSet<String>,
    /// `matching_set.len() / universe.len()`, the ratio checked against
    /// the condition's `max_allowed_matching_ratio`.
    pub matching_ratio: f64,
}

impl ConditionResult {
    /// Whether this result exceeds the condition's configured safety ceiling.
    #[must_use]
    pub fn exceeds_safety_ratio(&self, condition: &Condition) -> bool {
        self.matching_ratio > condition.max_allowed_matching_ratio
    }
}

/// Evaluates `condition` against `universe` (the shard's distinct observed
/// IMEIs), querying `source` for each dimension's underlying facts.
///
/// Dimensions are evaluated in parallel (rayon) since each is independent;
/// the condition's matching set is their intersection, with inverted
/// dimensions contributing the complement of their raw matching set
/// relative to `universe`.
#[must_use]
pub fn evaluate(
    condition: &Condition,
    universe: &[String],
    source: &(dyn ShardDataSource + Sync),
) -> ConditionResult {
    let universe_set: HashSet<&String> = universe.iter().collect();

    let dimension_sets: Vec<HashSet<String>> = condition
        .dimensions
        .par_iter()
        .map(|dimension| {
            let raw = dimensions::matching_set(&dimension.kind, universe, source);
            if dimension.invert {
                universe_set
                    .iter()
                    .filter(|imei| !raw.contains(***imei))
                    .map(|imei| (*imei).clone())
                    .collect()
            } else {
                raw
            }
        })
        .collect();

    let matching_set = intersect_all(dimension_sets);
    let matching_ratio = if universe.is_empty() {
        0.0
    } else {
        matching_set.len() as f64 / universe.len() as f64
    };

    ConditionResult {
        matching_set,
        matching_ratio,
    }
}

fn intersect_all(sets: Vec<HashSet<String>>) -> HashSet<String> {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return HashSet::new();
    };
    iter.fold(first, |acc, next| acc.intersection(&next).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::FixtureSource;
    use dirbs_domain_models::condition::{Dimension, DimensionKind};

    fn condition(ratio: f64, dimensions: Vec<Dimension>) -> Condition {
        Condition {
            label: "test_condition".to_string(),
            grace_period_days: 0,
            blocking: true,
            sticky: false,
            reason: "test".to_string(),
            max_allowed_matching_ratio: ratio,
            amnesty_eligible: false,
            dimensions,
        }
    }

    #[test]
    fn single_dimension_matches_directly() {
        let fixture = FixtureSource::default().with_stolen("A");
        let cond = condition(
            1.0,
            vec![Dimension {
                kind: DimensionKind::Stolen,
                invert: false,
            }],
        );
        let result = evaluate(&cond, &["A".into(), "B".into()], &fixture);
        assert_eq!(result.matching_set, ["A".to_string()].into_iter().collect());
    }

    #[test]
    fn two_dimensions_intersect() {
        let fixture = FixtureSource::default()
            .with_stolen("A")
            .with_stolen("B")
            .with_registered("B");
        let cond = condition(
            1.0,
            vec![
                Dimension {
                    kind: DimensionKind::Stolen,
                    invert: false,
                },
                Dimension {
                    kind: DimensionKind::NotOnRegistrationList,
                    invert: false,
                },
            ],
        );
        // A is stolen and unregistered; B is stolen but registered.
        let result = evaluate(&cond, &["A".into(), "B".into()], &fixture);
        assert_eq!(result.matching_set, ["A".to_string()].into_iter().collect());
    }

    #[test]
    fn invert_flag_complements_the_dimension() {
        let fixture = FixtureSource::default().with_stolen("A");
        let cond = condition(
            1.0,
            vec![Dimension {
                kind: DimensionKind::Stolen,
                invert: true,
            }],
        );
        let result = evaluate(&cond, &["A".into(), "B".into()], &fixture);
        assert_eq!(result.matching_set, ["B".to_string()].into_iter().collect());
    }

    #[test]
    fn safety_ratio_flags_overmatching_conditions() {
        let fixture = FixtureSource::default().with_stolen("A").with_stolen("B");
        let cond = condition(
            0.1,
            vec![Dimension {
                kind: DimensionKind::Stolen,
                invert: false,
            }],
        );
        let result = evaluate(&cond, &["A".into(), "B".into()], &fixture);
        assert_eq!(result.matching_ratio, 1.0);
        assert!(result.exceeds_safety_ratio(&cond));
    }

    #[test]
    fn empty_universe_yields_zero_ratio() {
        let fixture = FixtureSource::default();
        let cond = condition(
            0.1,
            vec![Dimension {
                kind: DimensionKind::Stolen,
                invert: false,
            }],
        );
        let result = evaluate(&cond, &[], &fixture);
        assert_eq!(result.matching_ratio, 0.0);
        assert!(!result.exceeds_safety_ratio(&cond));
    }
}
