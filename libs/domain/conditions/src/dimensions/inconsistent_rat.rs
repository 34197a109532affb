//! `inconsistent_rat`: IMEIs whose observed RAT bitmask disagrees with
//! the GSMA-reported device capability for their TAC.

use crate::source::ShardDataSource;
use std::collections::HashSet;

/// Matching set: every observed IMEI flagged RAT-inconsistent by the source.
pub fn matching_set(universe: &[String], source: &dyn ShardDataSource) -> HashSet<String> {
    universe
        .iter()
        .filter(|imei| !source.rat_is_consistent(imei))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::FixtureSource;

    #[test]
    fn matches_rat_inconsistent_imeis() {
        let fixture = FixtureSource::default().with_rat_inconsistent("A");
        let result = matching_set(&["A".into(), "B".into()], &fixture);
        assert_eq!(result, ["A".to_string()].into_iter().collect());
    }
}
