//! `malformed_imei`: IMEIs that fail `normalize_imei`'s structural check.
//!
//! Unlike the other dimensions this one needs no data-source lookups —
//! malformation is a pure function of the IMEI string itself — so its
//! matching set can be computed straight from the universe.

use dirbs_core_normalize::normalize_imei;
use std::collections::HashSet;

/// Matching set: every observed IMEI that fails structural normalization.
pub fn matching_set(universe: &[String]) -> HashSet<String> {
    universe
        .iter()
        .filter(|imei| normalize_imei(imei).is_err())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_structurally_invalid_imeis_only() {
        let result = matching_set(&["64220297727231".into(), "not an imei".into()]);
        assert_eq!(result, ["not an imei".to_string()].into_iter().collect());
    }
}
