//! Repository barrel: one module per persisted concern.

pub mod catalog;
pub mod classification;
pub mod historic;
pub mod job;
pub mod listgen_output;
pub mod listgen_source;
pub mod shard_source;

pub use catalog::DataCatalogRepository;
pub use classification::ClassificationStateRepository;
pub use historic::{
    GsmaTacPayload, HistoricBarredListRepository, HistoricListKind, HistoricListRepository,
    HistoricPairingListRepository,
};
pub use job::JobRepository;
pub use listgen_output::ListgenOutputRepository;
pub use listgen_source::PgListgenSnapshot;
pub use shard_source::PgShardSnapshot;
