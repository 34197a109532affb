//! `DataCatalogRepository`: records every input file observed by the
//! importer, regardless of whether it passed pre-validation
//! (SPEC_FULL.md §4.3, `catalog` subcommand).

use crate::errors::DbError;
use dirbs_domain_models::catalog::DataCatalogEntry;
use sqlx::PgPool;
use tracing::instrument;

pub struct DataCatalogRepository {
    pool: PgPool,
}

impl DataCatalogRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a file observation, bumping `last_seen` and `is_valid`
    /// when the file (by name) was seen before.
    #[instrument(skip(self, md5))]
    pub async fn record_observation(
        &self,
        filename: &str,
        md5: &str,
        size_bytes: i64,
        is_valid: bool,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO data_catalog (filename, md5, size_bytes, is_valid)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (filename) DO UPDATE SET
                 md5 = excluded.md5,
                 size_bytes = excluded.size_bytes,
                 is_valid = excluded.is_valid,
                 last_seen = now()",
        )
        .bind(filename)
        .bind(md5)
        .bind(size_bytes)
        .bind(is_valid)
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<DataCatalogEntry>, DbError> {
        let rows = sqlx::query_as::<_, CatalogRow>(
            "SELECT filename, md5, size_bytes, is_valid, first_seen, last_seen
             FROM data_catalog ORDER BY last_seen DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct CatalogRow {
    filename: String,
    md5: String,
    size_bytes: i64,
    is_valid: bool,
    first_seen: chrono::DateTime<chrono::Utc>,
    last_seen: chrono::DateTime<chrono::Utc>,
}

impl From<CatalogRow> for DataCatalogEntry {
    fn from(row: CatalogRow) -> Self {
        DataCatalogEntry {
            filename: row.filename,
            md5: row.md5,
            size_bytes: row.size_bytes as u64,
            is_valid: row.is_valid,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
        }
    }
}
