//! `duplicate_large`: IMEIs observed paired with more than `threshold`
//! distinct IMSIs within the lookback window (a large-scale cloning signal).

use crate::source::ShardDataSource;
use std::collections::HashSet;

/// Matching set: every observed IMEI whose distinct-IMSI count exceeds `threshold`.
pub fn matching_set(
    universe: &[String],
    source: &dyn ShardDataSource,
    threshold: u32,
) -> HashSet<String> {
    universe
        .iter()
        .filter(|imei| source.distinct_imsi_count(imei) > threshold)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::FixtureSource;

    #[test]
    fn matches_imeis_above_threshold() {
        let fixture = FixtureSource::default()
            .with_imsi_count("A", 10)
            .with_imsi_count("B", 2);
        let result = matching_set(&["A".into(), "B".into()], &fixture, 5);
        assert_eq!(result, ["A".to_string()].into_iter().collect());
    }

    #[test]
    fn threshold_is_exclusive() {
        let fixture = FixtureSource::default().with_imsi_count("A", 5);
        let result = matching_set(&["A".into()], &fixture, 5);
        assert!(result.is_empty());
    }
}
