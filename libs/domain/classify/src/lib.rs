//! Classification engine state reconciliation (SPEC_FULL.md §4.7).
//!
//! [`safety::check`] gates a condition's matching set against its
//! configured safety ratio; [`reconcile::reconcile`] then folds the
//! matching set into the condition's `classification_state` rows,
//! handling grace periods, sticky unmatches, and amnesty.

pub mod amnesty;
pub mod reconcile;
pub mod safety;

pub use amnesty::AmnestyPolicy;
pub use reconcile::{reconcile, ReconciliationOutcome};
pub use safety::{check as check_safety_ratio, SafetyRatioExceeded};
