//! Per-operator list derivation and delta computation (SPEC_FULL.md §4.8).

pub mod delta;
pub mod derive;
pub mod source;

pub use delta::{delta_blacklist, delta_exceptions, delta_notifications, exceeds_sanity_variance};
pub use derive::{derive_blacklist, derive_exceptions, derive_notifications, ListgenConfig};
pub use source::ListgenSource;
