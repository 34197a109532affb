//! Staging load and threshold guard (C4/C5, SPEC_FULL.md §4.4-§4.5).
//! Pure in-memory computation over [`row::ImportRow`]s: the actual
//! staging relation and delta-apply transaction live in
//! `dirbs-infra-db`, which takes the [`delta::DeltaPlan`] this crate
//! computes and applies it.

pub mod delta;
pub mod errors;
pub mod normalize;
pub mod row;
pub mod threshold;

pub use delta::{compute_delta, primary_key, DeltaPlan, DeltaViolations, ImportMode};
pub use errors::ThresholdError;
pub use row::{load_staging_rows, ChangeType, ImportRow};
