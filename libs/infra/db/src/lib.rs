//! Postgres persistence adapter: connection pool, schema migrations,
//! advisory locks, native range partitioning, and the repositories that
//! read and write every persisted entity.

pub mod client;
pub mod errors;
pub mod notify;
pub mod repartition;
pub mod repositories;
pub mod schema;

pub use client::{lock_keys, DbClient};
pub use errors::DbError;
pub use notify::{drain_whitelist_notifications, WHITELIST_CHANGES_CHANNEL};
pub use repartition::repartition;
pub use repositories::{
    ClassificationStateRepository, DataCatalogRepository, GsmaTacPayload,
    HistoricBarredListRepository, HistoricListKind, HistoricListRepository,
    HistoricPairingListRepository, JobRepository, ListgenOutputRepository, PgListgenSnapshot,
    PgShardSnapshot,
};
