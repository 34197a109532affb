//! `stolen`: IMEIs present on the live stolen list.

use crate::source::ShardDataSource;
use std::collections::HashSet;

/// Matching set: every observed IMEI that has a live stolen-list row.
pub fn matching_set(universe: &[String], source: &dyn ShardDataSource) -> HashSet<String> {
    universe
        .iter()
        .filter(|imei| source.is_stolen(imei))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::FixtureSource;

    #[test]
    fn matches_only_stolen_imeis() {
        let fixture = FixtureSource::default().with_stolen("A").with_stolen("B");
        let result = matching_set(&["A".into(), "B".into(), "C".into()], &fixture);
        assert_eq!(result, ["A".to_string(), "B".to_string()].into_iter().collect());
    }
}
