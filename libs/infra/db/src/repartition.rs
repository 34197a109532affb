//! Physical repartitioning of sharded base tables (SPEC_FULL.md §4.1, §6
//! `db repartition --num-physical-shards=N`).
//!
//! Boundaries are computed by [`dirbs_core_shard::partition::PartitionPlan`];
//! this module attaches one native Postgres range partition per boundary
//! missing from the target plan, copies every row out of children whose
//! boundary no longer matches the plan, and only then drops them, all in
//! one transaction so a mismatched child's rows are never orphaned.

use crate::errors::DbError;
use dirbs_core_shard::partition::PartitionPlan;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{info, instrument};

/// Applies `plan` to `base_table`, a table already declared
/// `PARTITION BY RANGE (virt_imei_shard)`. Existing child tables whose
/// suffix matches the plan are left untouched. Mismatched ones are
/// detached, their rows copied back into `base_table` (where they route
/// into whichever new partition now covers their `virt_imei_shard`),
/// then dropped. Missing boundaries are attached before the copy runs,
/// so every row has somewhere to land.
#[instrument(skip(pool, plan))]
pub async fn repartition(pool: &PgPool, base_table: &str, plan: &PartitionPlan) -> Result<(), DbError> {
    let target_suffixes: HashSet<String> = plan
        .boundaries()
        .iter()
        .map(|b| b.table_suffix())
        .collect();

    let existing = existing_child_suffixes(pool, base_table).await?;
    let stale: Vec<String> = existing.difference(&target_suffixes).cloned().collect();

    let mut tx = pool.begin().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

    for suffix in &stale {
        let child = format!("{base_table}_{suffix}");
        info!(child, "detaching partition no longer in target plan");
        let sql = format!("ALTER TABLE {base_table} DETACH PARTITION {child}");
        sqlx::query(&sql).execute(&mut *tx).await.map_err(DbError::QueryError)?;
    }

    for boundary in plan.boundaries() {
        let suffix = boundary.table_suffix();
        if existing.contains(&suffix) {
            continue;
        }
        let child = format!("{base_table}_{suffix}");
        info!(child, lo = boundary.lo, hi = boundary.hi, "attaching new partition");
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {child} PARTITION OF {base_table} FOR VALUES FROM ({}) TO ({})",
            boundary.lo,
            u16::from(boundary.hi) + 1,
        );
        sqlx::query(&create).execute(&mut *tx).await.map_err(DbError::QueryError)?;
    }

    for suffix in &stale {
        let child = format!("{base_table}_{suffix}");
        info!(child, "copying rows into new boundaries before dropping");
        let copy = format!("INSERT INTO {base_table} SELECT * FROM {child}");
        sqlx::query(&copy).execute(&mut *tx).await.map_err(DbError::QueryError)?;

        let drop = format!("DROP TABLE {child}");
        sqlx::query(&drop).execute(&mut *tx).await.map_err(DbError::QueryError)?;
    }

    tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
    Ok(())
}

async fn existing_child_suffixes(pool: &PgPool, base_table: &str) -> Result<HashSet<String>, DbError> {
    let prefix = format!("{base_table}_");
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT relname FROM pg_class c
         JOIN pg_inherits i ON i.inhrelid = c.oid
         JOIN pg_class p ON p.oid = i.inhparent
         WHERE p.relname = $1",
    )
    .bind(base_table)
    .fetch_all(pool)
    .await
    .map_err(DbError::QueryError)?;

    Ok(rows
        .into_iter()
        .filter_map(|(name,)| name.strip_prefix(&prefix).map(str::to_string))
        .collect())
}
