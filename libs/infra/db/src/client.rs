//! Postgres connection pool and advisory-lock helpers.

use crate::errors::DbError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, instrument};

/// Advisory lock keys used to serialize classification and listgen runs
/// against concurrent imports of the lists they read (SPEC_FULL.md §7).
pub mod lock_keys {
    pub const CLASSIFY: i64 = 0x4449_5242_5301;
    pub const LISTGEN: i64 = 0x4449_5242_5302;
}

#[derive(Clone)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        if database_url.is_empty() {
            return Err(DbError::ConfigurationError(
                "database url is empty".to_string(),
            ));
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        info!("connected to database pool (max_connections={max_connections})");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Blocks until `key`'s session-level advisory lock is acquired.
    /// The lock is released when `conn` is dropped or explicitly unlocked.
    pub async fn advisory_lock(
        conn: &mut sqlx::PgConnection,
        key: i64,
    ) -> Result<(), DbError> {
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(conn)
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    /// Attempts to acquire `key`'s advisory lock without blocking.
    /// Returns `Ok(false)` (not an error) when already held elsewhere.
    pub async fn try_advisory_lock(
        conn: &mut sqlx::PgConnection,
        key: i64,
    ) -> Result<bool, DbError> {
        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(conn)
            .await
            .map_err(DbError::QueryError)?;
        Ok(acquired)
    }

    pub async fn advisory_unlock(
        conn: &mut sqlx::PgConnection,
        key: i64,
    ) -> Result<(), DbError> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .execute(conn)
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }
}
