//! `JobRepository`: the authoritative store for `job_metadata`, every CLI
//! invocation's run record (SPEC_FULL.md §4.2).

use crate::errors::DbError;
use chrono::Utc;
use dirbs_domain_models::job::{JobMetadata, JobStatus};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, instrument};

pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new running job row and returns its `run_id`.
    #[instrument(skip(self))]
    pub async fn start(
        &self,
        command: &str,
        subcommand: Option<&str>,
        db_user: &str,
        command_line: &str,
    ) -> Result<i64, DbError> {
        let (run_id,): (i64,) = sqlx::query_as(
            "INSERT INTO job_metadata (command, subcommand, db_user, command_line, status)
             VALUES ($1, $2, $3, $4, 'running')
             RETURNING run_id",
        )
        .bind(command)
        .bind(subcommand)
        .bind(db_user)
        .bind(command_line)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::QueryError)?;

        info!(run_id, command, "job started");
        Ok(run_id)
    }

    /// Deep-merges `patch` into the job's `extra_metadata`, per
    /// [`JobMetadata::annotate`]'s contract.
    pub async fn annotate(&self, run_id: i64, patch: Value) -> Result<(), DbError> {
        let mut job = self.get(run_id).await?;
        job.annotate(patch);
        sqlx::query("UPDATE job_metadata SET extra_metadata = $1 WHERE run_id = $2")
            .bind(&job.extra_metadata)
            .bind(run_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::QueryError)?;
        Ok(())
    }

    pub async fn mark_success(&self, run_id: i64) -> Result<(), DbError> {
        self.finish(run_id, JobStatus::Success, None).await
    }

    pub async fn mark_error(&self, run_id: i64, exception_info: &str) -> Result<(), DbError> {
        self.finish(run_id, JobStatus::Error, Some(exception_info)).await
    }

    async fn finish(
        &self,
        run_id: i64,
        status: JobStatus,
        exception_info: Option<&str>,
    ) -> Result<(), DbError> {
        let status_str = match status {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        };
        let rows_affected = sqlx::query(
            "UPDATE job_metadata SET status = $1, end_time = $2, exception_info = $3 WHERE run_id = $4",
        )
        .bind(status_str)
        .bind(Utc::now())
        .bind(exception_info)
        .bind(run_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryError)?
        .rows_affected();

        if rows_affected == 0 {
            return Err(DbError::JobNotFound(run_id));
        }
        Ok(())
    }

    pub async fn get(&self, run_id: i64) -> Result<JobMetadata, DbError> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT run_id, command, subcommand, db_user, command_line,
                    start_time, end_time, status, extra_metadata, exception_info
             FROM job_metadata WHERE run_id = $1",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::QueryError)?
        .ok_or(DbError::JobNotFound(run_id))?;

        row.try_into()
    }

    /// Read path for the `report` subcommand: the most recent `limit`
    /// jobs, optionally filtered by command name.
    pub async fn query(&self, command: Option<&str>, limit: i64) -> Result<Vec<JobMetadata>, DbError> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT run_id, command, subcommand, db_user, command_line,
                    start_time, end_time, status, extra_metadata, exception_info
             FROM job_metadata
             WHERE $1::text IS NULL OR command = $1
             ORDER BY start_time DESC
             LIMIT $2",
        )
        .bind(command)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryError)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    run_id: i64,
    command: String,
    subcommand: Option<String>,
    db_user: String,
    command_line: String,
    start_time: chrono::DateTime<Utc>,
    end_time: Option<chrono::DateTime<Utc>>,
    status: String,
    extra_metadata: Value,
    exception_info: Option<String>,
}

impl TryFrom<JobRow> for JobMetadata {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, DbError> {
        let status = match row.status.as_str() {
            "running" => JobStatus::Running,
            "success" => JobStatus::Success,
            "error" => JobStatus::Error,
            other => return Err(DbError::MappingError(format!("unknown job status {other:?}"))),
        };
        Ok(JobMetadata {
            run_id: row.run_id,
            command: row.command,
            subcommand: row.subcommand,
            db_user: row.db_user,
            command_line: row.command_line,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            extra_metadata: row.extra_metadata,
            exception_info: row.exception_info,
        })
    }
}
