//! Dimension modules. One file per kind, matching the dimension names
//! in SPEC_FULL.md §4.7: `gsma_not_found`, `stolen`, `duplicate_large`,
//! `not_on_registration_list`, `malformed_imei`, `inconsistent_rat`.

pub mod duplicate_large;
pub mod gsma_not_found;
pub mod inconsistent_rat;
pub mod malformed_imei;
pub mod not_on_registration_list;
pub mod stolen;

use crate::source::ShardDataSource;
use dirbs_domain_models::condition::DimensionKind;
use std::collections::HashSet;

/// Computes the matching set of a single dimension kind over `universe`
/// (the shard's observed IMEIs), querying `source` for the underlying facts.
pub fn matching_set(
    kind: &DimensionKind,
    universe: &[String],
    source: &dyn ShardDataSource,
) -> HashSet<String> {
    match kind {
        DimensionKind::GsmaNotFound => gsma_not_found::matching_set(universe, source),
        DimensionKind::Stolen => stolen::matching_set(universe, source),
        DimensionKind::DuplicateLarge { threshold } => {
            duplicate_large::matching_set(universe, source, *threshold)
        }
        DimensionKind::NotOnRegistrationList => {
            not_on_registration_list::matching_set(universe, source)
        }
        DimensionKind::MalformedImei => malformed_imei::matching_set(universe),
        DimensionKind::InconsistentRat => inconsistent_rat::matching_set(universe, source),
    }
}
