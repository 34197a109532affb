//! `gsma_not_found`: IMEIs whose TAC is absent from the GSMA TAC directory.

use crate::source::ShardDataSource;
use std::collections::HashSet;

/// Matching set: every observed IMEI whose TAC has no GSMA directory entry.
pub fn matching_set(universe: &[String], source: &dyn ShardDataSource) -> HashSet<String> {
    universe
        .iter()
        .filter(|imei| !source.gsma_tac_found(imei))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::FixtureSource;

    #[test]
    fn matches_imeis_missing_from_gsma_directory() {
        let fixture = FixtureSource::default().with_gsma_found("A");
        let result = matching_set(&["A".into(), "B".into()], &fixture);
        assert_eq!(result, ["B".to_string()].into_iter().collect());
    }
}
