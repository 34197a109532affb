//! `ClassificationStateRepository`: reads and writes `classification_state`
//! rows (SPEC_FULL.md §4.7 step 3).

use crate::errors::DbError;
use dirbs_domain_classify::ReconciliationOutcome;
use dirbs_domain_models::classification::ClassificationState;
use sqlx::PgPool;
use tracing::instrument;

pub struct ClassificationStateRepository {
    pool: PgPool,
}

impl ClassificationStateRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All currently open rows for `cond_name`, scoped to the virt-shard
    /// range `[lo, hi]` so the engine can reconcile one shard at a time.
    #[instrument(skip(self))]
    pub async fn open_rows(
        &self,
        cond_name: &str,
        lo: u8,
        hi: u8,
    ) -> Result<Vec<ClassificationState>, DbError> {
        let rows = sqlx::query_as::<_, Row>(
            "SELECT virt_imei_shard, imei_norm, cond_name, start_date, end_date, block_date, amnesty_granted
             FROM classification_state
             WHERE cond_name = $1 AND end_date IS NULL AND virt_imei_shard BETWEEN $2 AND $3",
        )
        .bind(cond_name)
        .bind(i16::from(lo))
        .bind(i16::from(hi))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Every currently open row across every condition and shard, for
    /// listgen's blacklist/notifications derivation (SPEC_FULL.md §4.8),
    /// which reasons over the whole classification surface at once.
    #[instrument(skip(self))]
    pub async fn all_open_rows(&self) -> Result<Vec<ClassificationState>, DbError> {
        let rows = sqlx::query_as::<_, Row>(
            "SELECT virt_imei_shard, imei_norm, cond_name, start_date, end_date, block_date, amnesty_granted
             FROM classification_state
             WHERE end_date IS NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Applies one condition's reconciliation outcome in a single
    /// transaction: inserts opened rows, closes rows that unmatched,
    /// and updates retained rows whose `block_date` was just populated
    /// by a lapsed amnesty window.
    #[instrument(skip(self, outcome), fields(
        opened = outcome.opened.len(),
        closed = outcome.closed.len(),
        retained = outcome.retained.len(),
    ))]
    pub async fn apply_outcome(&self, outcome: &ReconciliationOutcome) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        for row in &outcome.opened {
            sqlx::query(
                "INSERT INTO classification_state
                     (virt_imei_shard, imei_norm, cond_name, start_date, end_date, block_date, amnesty_granted)
                 VALUES ($1, $2, $3, $4, NULL, $5, $6)",
            )
            .bind(i16::from(row.virt_imei_shard))
            .bind(&row.imei_norm)
            .bind(&row.cond_name)
            .bind(row.start_date)
            .bind(row.block_date)
            .bind(row.amnesty_granted)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        for row in &outcome.closed {
            sqlx::query(
                "UPDATE classification_state SET end_date = $1
                 WHERE imei_norm = $2 AND cond_name = $3 AND end_date IS NULL",
            )
            .bind(row.end_date)
            .bind(&row.imei_norm)
            .bind(&row.cond_name)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        for row in &outcome.retained {
            sqlx::query(
                "UPDATE classification_state SET block_date = $1
                 WHERE imei_norm = $2 AND cond_name = $3 AND end_date IS NULL",
            )
            .bind(row.block_date)
            .bind(&row.imei_norm)
            .bind(&row.cond_name)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct Row {
    virt_imei_shard: i16,
    imei_norm: String,
    cond_name: String,
    start_date: chrono::DateTime<chrono::Utc>,
    end_date: Option<chrono::DateTime<chrono::Utc>>,
    block_date: Option<chrono::DateTime<chrono::Utc>>,
    amnesty_granted: bool,
}

impl From<Row> for ClassificationState {
    fn from(row: Row) -> Self {
        ClassificationState {
            virt_imei_shard: row.virt_imei_shard as u8,
            imei_norm: row.imei_norm,
            cond_name: row.cond_name,
            start_date: row.start_date,
            end_date: row.end_date,
            block_date: row.block_date,
            amnesty_granted: row.amnesty_granted,
        }
    }
}
