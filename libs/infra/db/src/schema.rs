//! Schema installation and upgrade (SPEC_FULL.md §4.6 "Persisted state
//! layout"). A monotonic sequence of migrators, each idempotent under
//! re-run at its own target version, brings `schema_metadata.version`
//! from 0 to the latest known version.

use crate::errors::DbError;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

pub struct Migrator {
    pub version: i32,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

pub const MIGRATORS: &[Migrator] = &[
    Migrator {
        version: 1,
        description: "job_metadata, data_catalog, schema_metadata",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS schema_metadata (
                version INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS job_metadata (
                run_id BIGSERIAL PRIMARY KEY,
                command TEXT NOT NULL,
                subcommand TEXT,
                db_user TEXT NOT NULL,
                command_line TEXT NOT NULL,
                start_time TIMESTAMPTZ NOT NULL DEFAULT now(),
                end_time TIMESTAMPTZ,
                status TEXT NOT NULL DEFAULT 'running',
                extra_metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                exception_info TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS data_catalog (
                filename TEXT PRIMARY KEY,
                md5 TEXT NOT NULL,
                size_bytes BIGINT NOT NULL,
                is_valid BOOLEAN NOT NULL,
                first_seen TIMESTAMPTZ NOT NULL DEFAULT now(),
                last_seen TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        ],
    },
    Migrator {
        version: 2,
        description: "classification_state and blacklist",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS classification_state (
                virt_imei_shard SMALLINT NOT NULL,
                imei_norm TEXT NOT NULL,
                cond_name TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ,
                block_date TIMESTAMPTZ,
                amnesty_granted BOOLEAN NOT NULL DEFAULT false
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS classification_state_open_idx
                ON classification_state (imei_norm, cond_name)
                WHERE end_date IS NULL
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS classification_state_shard_idx
                ON classification_state (virt_imei_shard)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS blacklist (
                imei_norm TEXT NOT NULL,
                block_date TIMESTAMPTZ NOT NULL,
                reasons TEXT[] NOT NULL,
                start_run_id BIGINT NOT NULL,
                end_run_id BIGINT
            )
            "#,
        ],
    },
    Migrator {
        version: 3,
        description: "historic reference lists (unsharded: stolen, registration, gsma, pairing, barred)",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS historic_stolen_list (
                imei_norm TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL DEFAULT now(),
                end_date TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS historic_registration_list (
                imei_norm TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL DEFAULT now(),
                end_date TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS historic_gsma_tac (
                tac TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL DEFAULT now(),
                end_date TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS historic_pairing_list (
                operator_id TEXT NOT NULL,
                imei_norm TEXT NOT NULL,
                imsi TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL DEFAULT now(),
                end_date TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS historic_barred_list (
                operator_id TEXT NOT NULL,
                imei_norm TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL DEFAULT now(),
                end_date TIMESTAMPTZ
            )
            "#,
        ],
    },
    Migrator {
        version: 4,
        description: "sharded observed-network and observed-pairing base tables",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS observed_imei_imsi (
                virt_imei_shard SMALLINT NOT NULL,
                imei_norm TEXT NOT NULL,
                imsi TEXT NOT NULL,
                rat_bitmask INTEGER NOT NULL DEFAULT 0,
                observed_date TIMESTAMPTZ NOT NULL
            ) PARTITION BY RANGE (virt_imei_shard)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS observed_imei_msisdn (
                operator_id TEXT NOT NULL,
                imei_norm TEXT NOT NULL,
                msisdn TEXT NOT NULL,
                observed_date TIMESTAMPTZ NOT NULL
            )
            "#,
        ],
    },
    Migrator {
        version: 5,
        description: "historic_whitelist (notifies whitelist_changes on every delta apply)",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS historic_whitelist (
                imei_norm TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL DEFAULT now(),
                end_date TIMESTAMPTZ
            )
            "#,
        ],
    },
    Migrator {
        version: 6,
        description: "historic_gsma_tac device-capability payload (rat_bitmask, manufacturer, model, device_type)",
        statements: &[
            r#"
            ALTER TABLE historic_gsma_tac
                ADD COLUMN IF NOT EXISTS rat_bitmask INTEGER NOT NULL DEFAULT 0,
                ADD COLUMN IF NOT EXISTS manufacturer TEXT NOT NULL DEFAULT '',
                ADD COLUMN IF NOT EXISTS model_name TEXT NOT NULL DEFAULT '',
                ADD COLUMN IF NOT EXISTS device_type TEXT NOT NULL DEFAULT ''
            "#,
        ],
    },
];

#[instrument(skip(pool))]
pub async fn installed_version(pool: &PgPool) -> Result<i32, DbError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'schema_metadata')",
    )
    .fetch_one(pool)
    .await
    .map_err(DbError::QueryError)?;

    if !exists {
        return Ok(0);
    }

    let version: Option<i32> = sqlx::query_scalar("SELECT version FROM schema_metadata LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryError)?;

    Ok(version.unwrap_or(0))
}

/// Runs every migrator whose version is greater than the currently
/// installed one, in order, then stamps `schema_metadata` with the
/// final version. Safe to call against a fresh database (`install`)
/// or an existing one behind the latest version (`upgrade`).
#[instrument(skip(pool))]
pub async fn upgrade(pool: &PgPool) -> Result<i32, DbError> {
    let installed = installed_version(pool).await?;
    let latest = MIGRATORS.iter().map(|m| m.version).max().unwrap_or(0);

    if installed > latest {
        return Err(DbError::SchemaDowngrade {
            installed,
            requested: latest,
        });
    }

    for migrator in MIGRATORS.iter().filter(|m| m.version > installed) {
        debug!(version = migrator.version, "applying migrator: {}", migrator.description);
        for statement in migrator.statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(DbError::QueryError)?;
        }
    }

    sqlx::query("DELETE FROM schema_metadata")
        .execute(pool)
        .await
        .map_err(DbError::QueryError)?;
    sqlx::query("INSERT INTO schema_metadata (version) VALUES ($1)")
        .bind(latest)
        .execute(pool)
        .await
        .map_err(DbError::QueryError)?;

    info!(version = latest, "schema up to date");
    Ok(latest)
}

/// Fresh-install entry point; identical to `upgrade` since every
/// migrator is idempotent, but named separately to match the CLI's
/// `db install` / `db upgrade` subcommand split.
pub async fn install(pool: &PgPool) -> Result<i32, DbError> {
    upgrade(pool).await
}

/// Whether the installed schema matches the latest known version.
pub async fn check(pool: &PgPool) -> Result<bool, DbError> {
    let installed = installed_version(pool).await?;
    let latest = MIGRATORS.iter().map(|m| m.version).max().unwrap_or(0);
    Ok(installed == latest)
}
