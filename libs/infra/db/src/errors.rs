//! Error catalog for the persistence adapter (SPEC_FULL.md §8).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to establish or obtain a connection from the pool.
    #[error("database connection failed: {0}")]
    ConnectionError(String),

    /// A required connection setting (URL, credentials) was missing or malformed.
    #[error("database configuration invalid: {0}")]
    ConfigurationError(String),

    /// The database rejected a query.
    #[error("query failed: {0}")]
    QueryError(#[from] sqlx::Error),

    /// A row could not be mapped into a domain type.
    #[error("row mapping failed: {0}")]
    MappingError(String),

    /// A transaction could not be committed.
    #[error("transaction failed to commit: {0}")]
    TransactionError(String),

    /// The requested job does not exist.
    #[error("job not found: {0}")]
    JobNotFound(i64),

    /// An advisory lock is already held by another session.
    #[error("advisory lock {0} is held by another session")]
    LockContended(i64),

    /// The requested schema migration target is lower than the installed version.
    #[error("schema downgrade requested: installed version {installed}, requested {requested}")]
    SchemaDowngrade { installed: i32, requested: i32 },
}
