//! SCD-2 maintenance for the unsharded historic reference lists
//! (`historic_stolen_list`, `historic_registration_list`,
//! `historic_gsma_tac`, `historic_whitelist`) and the per-operator
//! pairing/barred lists (SPEC_FULL.md §4.4, §3 entity 4-5). All these
//! tables share the same start_date/end_date-close-and-reopen shape;
//! `HistoricListRepository` parameterizes over the single-key lists and
//! two dedicated repositories cover the composite-key pairing and
//! barred lists.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

/// One of the single-key historic reference lists.
#[derive(Debug, Clone, Copy)]
pub enum HistoricListKind {
    Stolen,
    Registration,
    GsmaTac,
    /// `historic_whitelist`: the only list whose delta apply also posts a
    /// `pg_notify` per changed key, for the `whitelist distribute`
    /// subcommand to pick up (SPEC_FULL.md §4.6 "side effect hooks").
    Whitelist,
}

impl HistoricListKind {
    fn table(self) -> &'static str {
        match self {
            Self::Stolen => "historic_stolen_list",
            Self::Registration => "historic_registration_list",
            Self::GsmaTac => "historic_gsma_tac",
            Self::Whitelist => "historic_whitelist",
        }
    }

    fn key_column(self) -> &'static str {
        match self {
            Self::Stolen | Self::Registration | Self::Whitelist => "imei_norm",
            Self::GsmaTac => "tac",
        }
    }

    /// The notification channel this list's changes are posted on, if any.
    fn notify_channel(self) -> Option<&'static str> {
        match self {
            Self::Whitelist => Some("historic_whitelist_changes"),
            _ => None,
        }
    }
}

pub struct HistoricListRepository {
    pool: PgPool,
    kind: HistoricListKind,
}

impl HistoricListRepository {
    #[must_use]
    pub fn new(pool: PgPool, kind: HistoricListKind) -> Self {
        Self { pool, kind }
    }

    /// All keys currently live (`end_date IS NULL`).
    pub async fn live_keys(&self) -> Result<Vec<String>, DbError> {
        let sql = format!(
            "SELECT {col} FROM {table} WHERE end_date IS NULL",
            col = self.kind.key_column(),
            table = self.kind.table(),
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::QueryError)?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    /// Applies one delta-mode import batch: `added` keys become newly
    /// live rows (no-op if already live), `removed` keys are closed as
    /// of `as_of`. Both vecs are assumed already validated against
    /// liveness by the importer (add-already-live / remove-not-live are
    /// rejected upstream).
    #[instrument(skip(self, added, removed), fields(table = self.kind.table(), added = added.len(), removed = removed.len()))]
    pub async fn apply_delta(
        &self,
        added: &[String],
        removed: &[String],
        as_of: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let table = self.kind.table();
        let col = self.kind.key_column();
        let mut tx = self.pool.begin().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        if !added.is_empty() {
            let insert_sql = format!(
                "INSERT INTO {table} ({col}, start_date, end_date)
                 SELECT unnest($1::text[]), $2, NULL",
            );
            sqlx::query(&insert_sql)
                .bind(added)
                .bind(as_of)
                .execute(&mut *tx)
                .await
                .map_err(DbError::QueryError)?;
        }

        if !removed.is_empty() {
            let close_sql = format!(
                "UPDATE {table} SET end_date = $1
                 WHERE {col} = ANY($2) AND end_date IS NULL",
            );
            sqlx::query(&close_sql)
                .bind(as_of)
                .bind(removed)
                .execute(&mut *tx)
                .await
                .map_err(DbError::QueryError)?;
        }

        if let Some(channel) = self.kind.notify_channel() {
            for key in added.iter().chain(removed) {
                sqlx::query("SELECT pg_notify($1, $2)")
                    .bind(channel)
                    .bind(key)
                    .execute(&mut *tx)
                    .await
                    .map_err(DbError::QueryError)?;
            }
        }

        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(())
    }

    /// Deletes rows closed before `cutoff`, per the `prune` subcommand's
    /// retention window.
    pub async fn prune_closed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let sql = format!("DELETE FROM {} WHERE end_date < $1", self.kind.table());
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(DbError::QueryError)?;
        Ok(result.rows_affected())
    }

    /// `GsmaTac`-only variant of [`Self::apply_delta`]: carries the
    /// device-capability payload (`rat_bitmask`, manufacturer, model,
    /// device type) alongside the key, since `historic_gsma_tac` is the
    /// one single-key list whose rows aren't pure membership markers.
    /// Callers must only invoke this when `self.kind` is `GsmaTac`.
    #[instrument(skip(self, added, removed), fields(added = added.len(), removed = removed.len()))]
    pub async fn apply_gsma_delta(
        &self,
        added: &[GsmaTacPayload],
        removed: &[String],
        as_of: DateTime<Utc>,
    ) -> Result<(), DbError> {
        debug_assert!(matches!(self.kind, HistoricListKind::GsmaTac));
        let mut tx = self.pool.begin().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        for payload in added {
            sqlx::query(
                "INSERT INTO historic_gsma_tac
                    (tac, rat_bitmask, manufacturer, model_name, device_type, start_date, end_date)
                 VALUES ($1, $2, $3, $4, $5, $6, NULL)",
            )
            .bind(&payload.tac)
            .bind(payload.rat_bitmask)
            .bind(&payload.manufacturer)
            .bind(&payload.model_name)
            .bind(&payload.device_type)
            .bind(as_of)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        if !removed.is_empty() {
            sqlx::query(
                "UPDATE historic_gsma_tac SET end_date = $1
                 WHERE tac = ANY($2) AND end_date IS NULL",
            )
            .bind(as_of)
            .bind(removed)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(())
    }
}

/// The GSMA device-capability payload carried by one `tac` row:
/// `rat_bitmask` is the radio access technologies the `bands` column
/// lists, derived at staging time.
#[derive(Debug, Clone)]
pub struct GsmaTacPayload {
    pub tac: String,
    pub rat_bitmask: i32,
    pub manufacturer: String,
    pub model_name: String,
    pub device_type: String,
}

/// `historic_pairing_list`: keyed on `(operator_id, imei_norm, imsi)`.
pub struct HistoricPairingListRepository {
    pool: PgPool,
}

impl HistoricPairingListRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn apply_delta(
        &self,
        operator_id: &str,
        added: &[(String, String)],
        removed: &[(String, String)],
        as_of: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        for (imei_norm, imsi) in added {
            sqlx::query(
                "INSERT INTO historic_pairing_list (operator_id, imei_norm, imsi, start_date, end_date)
                 VALUES ($1, $2, $3, $4, NULL)",
            )
            .bind(operator_id)
            .bind(imei_norm)
            .bind(imsi)
            .bind(as_of)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        for (imei_norm, imsi) in removed {
            sqlx::query(
                "UPDATE historic_pairing_list SET end_date = $1
                 WHERE operator_id = $2 AND imei_norm = $3 AND imsi = $4 AND end_date IS NULL",
            )
            .bind(as_of)
            .bind(operator_id)
            .bind(imei_norm)
            .bind(imsi)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(())
    }

    pub async fn prune_closed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM historic_pairing_list WHERE end_date < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(DbError::QueryError)?;
        Ok(result.rows_affected())
    }

    /// All `(imei_norm, imsi)` pairs currently live for `operator_id`.
    pub async fn live_pairs(&self, operator_id: &str) -> Result<Vec<(String, String)>, DbError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT imei_norm, imsi FROM historic_pairing_list
             WHERE operator_id = $1 AND end_date IS NULL",
        )
        .bind(operator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(rows)
    }
}

/// `historic_barred_list`: keyed on `(operator_id, imei_norm)`.
pub struct HistoricBarredListRepository {
    pool: PgPool,
}

impl HistoricBarredListRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn apply_delta(
        &self,
        operator_id: &str,
        added: &[String],
        removed: &[String],
        as_of: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        if !added.is_empty() {
            sqlx::query(
                "INSERT INTO historic_barred_list (operator_id, imei_norm, start_date, end_date)
                 SELECT $1, unnest($2::text[]), $3, NULL",
            )
            .bind(operator_id)
            .bind(added)
            .bind(as_of)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        if !removed.is_empty() {
            sqlx::query(
                "UPDATE historic_barred_list SET end_date = $1
                 WHERE operator_id = $2 AND imei_norm = ANY($3) AND end_date IS NULL",
            )
            .bind(as_of)
            .bind(operator_id)
            .bind(removed)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryError)?;
        }

        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(())
    }

    pub async fn prune_closed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM historic_barred_list WHERE end_date < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(DbError::QueryError)?;
        Ok(result.rows_affected())
    }

    /// All `imei_norm`s currently live for `operator_id`.
    pub async fn live_imeis(&self, operator_id: &str) -> Result<Vec<String>, DbError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT imei_norm FROM historic_barred_list
             WHERE operator_id = $1 AND end_date IS NULL",
        )
        .bind(operator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }
}
