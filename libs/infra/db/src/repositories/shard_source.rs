//! `PgShardSnapshot`: a single virt-shard's dimension facts, loaded from
//! Postgres into memory up front so the classification engine's pure,
//! synchronous `ShardDataSource` trait (SPEC_FULL.md §4.7) can run
//! against it without threading async I/O through every dimension.
//! Evaluating shard-by-shard bounds how much of this snapshot is ever
//! resident at once.

use crate::errors::DbError;
use dirbs_domain_conditions::ShardDataSource;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

pub struct PgShardSnapshot {
    shard: u8,
    observed: Vec<String>,
    stolen: HashSet<String>,
    registered: HashSet<String>,
    gsma_found: HashSet<String>,
    rat_inconsistent: HashSet<String>,
    imsi_counts: HashMap<String, u32>,
    first_observed: HashMap<String, chrono::DateTime<chrono::Utc>>,
}

impl PgShardSnapshot {
    #[instrument(skip(pool))]
    pub async fn load(pool: &PgPool, shard: u8, lookback_days: u32) -> Result<Self, DbError> {
        let observed: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT imei_norm FROM observed_imei_imsi
             WHERE virt_imei_shard = $1 AND observed_date > now() - ($2 || ' days')::interval",
        )
        .bind(i16::from(shard))
        .bind(lookback_days.to_string())
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryError)?;
        let observed: Vec<String> = observed.into_iter().map(|(imei,)| imei).collect();

        let stolen = fetch_live_set(
            pool,
            "SELECT imei_norm FROM historic_stolen_list WHERE end_date IS NULL AND imei_norm = ANY($1)",
            &observed,
        )
        .await?;
        let registered = fetch_live_set(
            pool,
            "SELECT imei_norm FROM historic_registration_list WHERE end_date IS NULL AND imei_norm = ANY($1)",
            &observed,
        )
        .await?;

        let tacs: Vec<String> = observed.iter().filter_map(|imei| imei.get(0..8)).map(str::to_string).collect();
        let live_tacs = fetch_live_set(
            pool,
            "SELECT tac FROM historic_gsma_tac WHERE end_date IS NULL AND tac = ANY($1)",
            &tacs,
        )
        .await?;
        let gsma_found: HashSet<String> = observed
            .iter()
            .filter(|imei| imei.get(0..8).is_some_and(|tac| live_tacs.contains(tac)))
            .cloned()
            .collect();

        let observed_rat_rows: Vec<(String, i32)> = sqlx::query_as(
            "SELECT imei_norm, BIT_OR(rat_bitmask) FROM observed_imei_imsi
             WHERE virt_imei_shard = $1 AND imei_norm = ANY($2)
             GROUP BY imei_norm",
        )
        .bind(i16::from(shard))
        .bind(&observed)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryError)?;
        let observed_rat: HashMap<String, i32> = observed_rat_rows.into_iter().collect();

        let gsma_rat_rows: Vec<(String, i32)> = if tacs.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                "SELECT tac, rat_bitmask FROM historic_gsma_tac
                 WHERE end_date IS NULL AND tac = ANY($1)",
            )
            .bind(&tacs)
            .fetch_all(pool)
            .await
            .map_err(DbError::QueryError)?
        };
        let gsma_rat: HashMap<String, i32> = gsma_rat_rows.into_iter().collect();

        // An IMEI is RAT-inconsistent when it reported a radio access
        // technology its TAC's GSMA capability doesn't list. Absent GSMA
        // data for the TAC, there's nothing to compare against, so the
        // device is left out (the `GsmaNotFound` dimension covers that case).
        let rat_inconsistent: HashSet<String> = observed
            .iter()
            .filter(|imei| {
                let Some(tac) = imei.get(0..8) else { return false };
                let Some(&capability) = gsma_rat.get(tac) else { return false };
                let observed_bits = observed_rat.get(*imei).copied().unwrap_or(0);
                observed_bits & !capability != 0
            })
            .cloned()
            .collect();

        let imsi_count_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT imei_norm, COUNT(DISTINCT imsi) FROM observed_imei_imsi
             WHERE virt_imei_shard = $1 AND imei_norm = ANY($2)
             GROUP BY imei_norm",
        )
        .bind(i16::from(shard))
        .bind(&observed)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryError)?;
        let imsi_counts: HashMap<String, u32> = imsi_count_rows
            .into_iter()
            .map(|(imei, count)| (imei, count as u32))
            .collect();

        let first_observed_rows: Vec<(String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT imei_norm, MIN(observed_date) FROM observed_imei_imsi
             WHERE virt_imei_shard = $1 AND imei_norm = ANY($2)
             GROUP BY imei_norm",
        )
        .bind(i16::from(shard))
        .bind(&observed)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryError)?;
        let first_observed: HashMap<String, chrono::DateTime<chrono::Utc>> =
            first_observed_rows.into_iter().collect();

        Ok(Self {
            shard,
            observed,
            stolen,
            registered,
            gsma_found,
            rat_inconsistent,
            imsi_counts,
            first_observed,
        })
    }

    #[must_use]
    pub fn observed(&self) -> &[String] {
        &self.observed
    }

    /// Whether `imei_norm` was first observed on the network strictly
    /// before `cutoff`, for amnesty eligibility (SPEC_FULL.md §4.7 step 4).
    #[must_use]
    pub fn observed_before(&self, imei_norm: &str, cutoff: chrono::DateTime<chrono::Utc>) -> bool {
        self.first_observed
            .get(imei_norm)
            .is_some_and(|first| *first < cutoff)
    }
}

async fn fetch_live_set(pool: &PgPool, sql: &str, keys: &[String]) -> Result<HashSet<String>, DbError> {
    if keys.is_empty() {
        return Ok(HashSet::new());
    }
    let rows: Vec<(String,)> = sqlx::query_as(sql)
        .bind(keys)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryError)?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

impl ShardDataSource for PgShardSnapshot {
    fn observed_imeis(&self, shard: u8) -> Vec<String> {
        if shard == self.shard {
            self.observed.clone()
        } else {
            Vec::new()
        }
    }

    fn is_stolen(&self, imei_norm: &str) -> bool {
        self.stolen.contains(imei_norm)
    }

    fn is_on_registration_list(&self, imei_norm: &str) -> bool {
        self.registered.contains(imei_norm)
    }

    fn gsma_tac_found(&self, imei_norm: &str) -> bool {
        self.gsma_found.contains(imei_norm)
    }

    fn distinct_imsi_count(&self, imei_norm: &str) -> u32 {
        self.imsi_counts.get(imei_norm).copied().unwrap_or(0)
    }

    fn rat_is_consistent(&self, imei_norm: &str) -> bool {
        !self.rat_inconsistent.contains(imei_norm)
    }
}
