//! Dimension registry and condition matching-set evaluation.
//!
//! [`source::ShardDataSource`] is the storage-agnostic contract dimensions
//! query; [`dimensions`] holds the closed set of dimension kinds; and
//! [`evaluator::evaluate`] combines a [`Condition`]'s dimensions into a
//! single matching set.

pub mod dimensions;
pub mod evaluator;
pub mod source;

pub use dirbs_domain_models::condition::{Condition, Dimension, DimensionKind};
pub use evaluator::{evaluate, ConditionResult};
pub use source::ShardDataSource;
