//! Operator configuration (SPEC_FULL.md §3).

use dirbs_core_normalize::MccMncPrefix;
use serde::{Deserialize, Serialize};

/// A configured mobile operator and the MCC+MNC prefixes it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operator {
    /// Lowercase alnum+underscore id, at most 16 characters.
    pub operator_id: String,
    /// Human-readable display name.
    pub name: String,
    /// MCC+MNC prefixes owned by this operator; disjoint from every
    /// other operator's prefixes (SPEC_FULL.md §3, §8).
    pub mcc_mnc_prefixes: Vec<MccMncPrefix>,
}
