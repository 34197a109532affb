//! `not_on_registration_list`: IMEIs absent from the device registration list.

use crate::source::ShardDataSource;
use std::collections::HashSet;

/// Matching set: every observed IMEI with no live registration-list row.
pub fn matching_set(universe: &[String], source: &dyn ShardDataSource) -> HashSet<String> {
    universe
        .iter()
        .filter(|imei| !source.is_on_registration_list(imei))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::FixtureSource;

    #[test]
    fn matches_unregistered_imeis() {
        let fixture = FixtureSource::default().with_registered("A");
        let result = matching_set(&["A".into(), "B".into()], &fixture);
        assert_eq!(result, ["B".to_string()].into_iter().collect());
    }
}
