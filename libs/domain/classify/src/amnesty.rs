//! Amnesty window configuration (SPEC_FULL.md §4.7 step 4).

use chrono::{DateTime, Utc};

/// A configured amnesty window. When present, IMEIs newly matching a
/// blocking condition that were observed on the network before
/// `cutoff_date` are granted amnesty instead of an immediate grace
/// countdown; their `block_date` stays unset until `amnesty_end_date`.
#[derive(Debug, Clone, PartialEq)]
pub struct AmnestyPolicy {
    /// IMEIs observed before this date are amnesty-eligible.
    pub cutoff_date: DateTime<Utc>,
    /// Date after which amnesty-granted rows resume grace-period counting.
    pub amnesty_end_date: DateTime<Utc>,
}

impl AmnestyPolicy {
    /// Whether `amnesty_end_date` has passed as of `as_of`.
    #[must_use]
    pub fn has_ended(&self, as_of: DateTime<Utc>) -> bool {
        as_of >= self.amnesty_end_date
    }
}
