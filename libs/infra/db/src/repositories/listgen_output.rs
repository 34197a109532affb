//! Writes and re-reads listgen output rows (SPEC_FULL.md §4.8). The
//! blacklist is a single shared table; notifications and exceptions are
//! split one table per operator, created on first use, mirroring the
//! dynamic per-shard partitioning in [`crate::repartition`].

use crate::errors::DbError;
use dirbs_domain_models::list::{BlacklistRow, ExceptionRow, NotificationRow};
use sqlx::PgPool;
use tracing::instrument;

pub struct ListgenOutputRepository {
    pool: PgPool,
}

impl ListgenOutputRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn notifications_table(operator_id: &str) -> Result<String, DbError> {
        table_name("notifications_lists", operator_id)
    }

    fn exceptions_table(operator_id: &str) -> Result<String, DbError> {
        table_name("exceptions_lists", operator_id)
    }

    /// Creates the per-operator notifications and exceptions tables if
    /// they don't already exist.
    #[instrument(skip(self))]
    pub async fn ensure_operator_tables(&self, operator_id: &str) -> Result<(), DbError> {
        let notifications = Self::notifications_table(operator_id)?;
        let exceptions = Self::exceptions_table(operator_id)?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {notifications} (
                imei_norm TEXT NOT NULL,
                imsi TEXT NOT NULL,
                msisdn TEXT NOT NULL,
                block_date TIMESTAMPTZ NOT NULL,
                reasons TEXT[] NOT NULL,
                start_run_id BIGINT NOT NULL,
                end_run_id BIGINT
            )"
        ))
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryError)?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {exceptions} (
                imei_norm TEXT NOT NULL,
                imsi TEXT NOT NULL,
                start_run_id BIGINT NOT NULL,
                end_run_id BIGINT
            )"
        ))
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryError)?;

        Ok(())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn write_blacklist(&self, rows: &[BlacklistRow]) -> Result<(), DbError> {
        for row in rows {
            sqlx::query(
                "INSERT INTO blacklist (imei_norm, block_date, reasons, start_run_id, end_run_id)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&row.imei_norm)
            .bind(row.block_date)
            .bind(&row.reasons)
            .bind(row.start_run_id)
            .bind(row.end_run_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::QueryError)?;
        }
        Ok(())
    }

    pub async fn write_notifications(
        &self,
        operator_id: &str,
        rows: &[NotificationRow],
    ) -> Result<(), DbError> {
        let table = Self::notifications_table(operator_id)?;
        for row in rows {
            sqlx::query(&format!(
                "INSERT INTO {table} (imei_norm, imsi, msisdn, block_date, reasons, start_run_id, end_run_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ))
            .bind(&row.imei_norm)
            .bind(&row.imsi)
            .bind(&row.msisdn)
            .bind(row.block_date)
            .bind(&row.reasons)
            .bind(row.start_run_id)
            .bind(row.end_run_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::QueryError)?;
        }
        Ok(())
    }

    pub async fn write_exceptions(
        &self,
        operator_id: &str,
        rows: &[ExceptionRow],
    ) -> Result<(), DbError> {
        let table = Self::exceptions_table(operator_id)?;
        for row in rows {
            sqlx::query(&format!(
                "INSERT INTO {table} (imei_norm, imsi, start_run_id, end_run_id)
                 VALUES ($1, $2, $3, $4)"
            ))
            .bind(&row.imei_norm)
            .bind(&row.imsi)
            .bind(row.start_run_id)
            .bind(row.end_run_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::QueryError)?;
        }
        Ok(())
    }

    /// Blacklist rows still open (never closed by a later run).
    pub async fn live_blacklist(&self) -> Result<Vec<BlacklistRow>, DbError> {
        let rows = sqlx::query_as::<_, BlacklistRowSql>(
            "SELECT imei_norm, block_date, reasons, start_run_id, end_run_id
             FROM blacklist
             WHERE end_run_id IS NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Blacklist rows live at `base_run_id`: started at or before it and
    /// either still live or not yet ended by it.
    pub async fn base_blacklist(&self, base_run_id: i64) -> Result<Vec<BlacklistRow>, DbError> {
        let rows = sqlx::query_as::<_, BlacklistRowSql>(
            "SELECT imei_norm, block_date, reasons, start_run_id, end_run_id
             FROM blacklist
             WHERE start_run_id <= $1 AND (end_run_id IS NULL OR end_run_id > $1)",
        )
        .bind(base_run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn live_notifications(&self, operator_id: &str) -> Result<Vec<NotificationRow>, DbError> {
        let table = Self::notifications_table(operator_id)?;
        let rows = sqlx::query_as::<_, NotificationRowSql>(&format!(
            "SELECT imei_norm, imsi, msisdn, block_date, reasons, start_run_id, end_run_id
             FROM {table}
             WHERE end_run_id IS NULL"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn live_exceptions(&self, operator_id: &str) -> Result<Vec<ExceptionRow>, DbError> {
        let table = Self::exceptions_table(operator_id)?;
        let rows = sqlx::query_as::<_, ExceptionRowSql>(&format!(
            "SELECT imei_norm, imsi, start_run_id, end_run_id
             FROM {table}
             WHERE end_run_id IS NULL"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn base_notifications(
        &self,
        operator_id: &str,
        base_run_id: i64,
    ) -> Result<Vec<NotificationRow>, DbError> {
        let table = Self::notifications_table(operator_id)?;
        let rows = sqlx::query_as::<_, NotificationRowSql>(&format!(
            "SELECT imei_norm, imsi, msisdn, block_date, reasons, start_run_id, end_run_id
             FROM {table}
             WHERE start_run_id <= $1 AND (end_run_id IS NULL OR end_run_id > $1)"
        ))
        .bind(base_run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn base_exceptions(
        &self,
        operator_id: &str,
        base_run_id: i64,
    ) -> Result<Vec<ExceptionRow>, DbError> {
        let table = Self::exceptions_table(operator_id)?;
        let rows = sqlx::query_as::<_, ExceptionRowSql>(&format!(
            "SELECT imei_norm, imsi, start_run_id, end_run_id
             FROM {table}
             WHERE start_run_id <= $1 AND (end_run_id IS NULL OR end_run_id > $1)"
        ))
        .bind(base_run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Retires live blacklist rows for `imei_norms`, stamping `end_run_id`
    /// so the next `base_blacklist` call at a later run no longer sees
    /// them as live. Called for rows this run's delta classified as
    /// `resolved` or `changed` (a changed row is retired and reinserted).
    pub async fn close_blacklist(&self, imei_norms: &[String], run_id: i64) -> Result<(), DbError> {
        if imei_norms.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "UPDATE blacklist SET end_run_id = $1
             WHERE imei_norm = ANY($2) AND end_run_id IS NULL",
        )
        .bind(run_id)
        .bind(imei_norms)
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(())
    }

    pub async fn close_notifications(
        &self,
        operator_id: &str,
        keys: &[(String, String)],
        run_id: i64,
    ) -> Result<(), DbError> {
        if keys.is_empty() {
            return Ok(());
        }
        let table = Self::notifications_table(operator_id)?;
        let (imeis, imsis): (Vec<String>, Vec<String>) = keys.iter().cloned().unzip();
        sqlx::query(&format!(
            "UPDATE {table} SET end_run_id = $1
             WHERE end_run_id IS NULL
               AND (imei_norm, imsi) IN (SELECT * FROM UNNEST($2::text[], $3::text[]))"
        ))
        .bind(run_id)
        .bind(imeis)
        .bind(imsis)
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(())
    }

    pub async fn close_exceptions(
        &self,
        operator_id: &str,
        keys: &[(String, String)],
        run_id: i64,
    ) -> Result<(), DbError> {
        if keys.is_empty() {
            return Ok(());
        }
        let table = Self::exceptions_table(operator_id)?;
        let (imeis, imsis): (Vec<String>, Vec<String>) = keys.iter().cloned().unzip();
        sqlx::query(&format!(
            "UPDATE {table} SET end_run_id = $1
             WHERE end_run_id IS NULL
               AND (imei_norm, imsi) IN (SELECT * FROM UNNEST($2::text[], $3::text[]))"
        ))
        .bind(run_id)
        .bind(imeis)
        .bind(imsis)
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryError)?;
        Ok(())
    }
}

/// Operator ids are used to build table identifiers; only allow the
/// characters Postgres permits in an unquoted identifier, to avoid
/// passing an operator-controlled string into string-interpolated SQL.
fn table_name(prefix: &str, operator_id: &str) -> Result<String, DbError> {
    let valid = !operator_id.is_empty()
        && operator_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && operator_id.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !valid {
        return Err(DbError::ConfigurationError(format!(
            "invalid operator id for table name: {operator_id:?}"
        )));
    }
    Ok(format!("{prefix}_{}", operator_id.to_ascii_lowercase()))
}

#[derive(sqlx::FromRow)]
struct BlacklistRowSql {
    imei_norm: String,
    block_date: chrono::DateTime<chrono::Utc>,
    reasons: Vec<String>,
    start_run_id: i64,
    end_run_id: Option<i64>,
}

impl From<BlacklistRowSql> for BlacklistRow {
    fn from(row: BlacklistRowSql) -> Self {
        BlacklistRow {
            imei_norm: row.imei_norm,
            block_date: row.block_date,
            reasons: row.reasons,
            start_run_id: row.start_run_id,
            end_run_id: row.end_run_id,
            delta_reason: None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRowSql {
    imei_norm: String,
    imsi: String,
    msisdn: String,
    block_date: chrono::DateTime<chrono::Utc>,
    reasons: Vec<String>,
    start_run_id: i64,
    end_run_id: Option<i64>,
}

impl From<NotificationRowSql> for NotificationRow {
    fn from(row: NotificationRowSql) -> Self {
        NotificationRow {
            imei_norm: row.imei_norm,
            imsi: row.imsi,
            msisdn: row.msisdn,
            block_date: row.block_date,
            reasons: row.reasons,
            start_run_id: row.start_run_id,
            end_run_id: row.end_run_id,
            delta_reason: None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ExceptionRowSql {
    imei_norm: String,
    imsi: String,
    start_run_id: i64,
    end_run_id: Option<i64>,
}

impl From<ExceptionRowSql> for ExceptionRow {
    fn from(row: ExceptionRowSql) -> Self {
        ExceptionRow {
            imei_norm: row.imei_norm,
            imsi: row.imsi,
            start_run_id: row.start_run_id,
            end_run_id: row.end_run_id,
            delta_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_rejects_non_identifier_operator_id() {
        assert!(table_name("notifications_lists", "op; DROP TABLE x;--").is_err());
        assert!(table_name("notifications_lists", "1starts_with_digit").is_err());
        assert!(table_name("notifications_lists", "").is_err());
    }

    #[test]
    fn table_name_accepts_plain_identifier() {
        assert_eq!(
            table_name("notifications_lists", "OperatorA").unwrap(),
            "notifications_lists_operatora"
        );
    }
}
