//! Shared domain entities for DIRBS Core: conditions, classification
//! state, job metadata, the data catalog, and list-generation output rows.
//!
//! This crate holds data only — no I/O, no database access. Repositories
//! in `dirbs-infra-db` read and write these types; the classification and
//! listgen engines operate on them in memory.

pub mod catalog;
pub mod classification;
pub mod condition;
pub mod job;
pub mod list;
pub mod operator;

pub use catalog::DataCatalogEntry;
pub use classification::ClassificationState;
pub use condition::{Condition, Dimension, DimensionKind};
pub use job::{JobMetadata, JobStatus};
pub use list::{BlacklistRow, DeltaReason, ExceptionRow, NotificationRow};
pub use operator::Operator;
