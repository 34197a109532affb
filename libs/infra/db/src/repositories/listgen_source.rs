//! `PgListgenSnapshot`: observation and pairing facts for one operator,
//! preloaded into memory for the same reason as `PgShardSnapshot` —
//! `dirbs_domain_listgen::ListgenSource` is a synchronous contract.

use crate::errors::DbError;
use dirbs_domain_listgen::ListgenSource;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

pub struct PgListgenSnapshot {
    pairs: HashMap<String, Vec<(String, String)>>,
    live_pairs: HashSet<(String, String)>,
    pairing_list: HashMap<String, Vec<(String, String)>>,
    barred: HashMap<String, Vec<String>>,
}

impl PgListgenSnapshot {
    #[instrument(skip(pool, candidate_imeis))]
    pub async fn load(
        pool: &PgPool,
        operator_id: &str,
        candidate_imeis: &[String],
        lookback_days: u32,
    ) -> Result<Self, DbError> {
        let mut pairs: HashMap<String, Vec<(String, String)>> = HashMap::new();
        if !candidate_imeis.is_empty() {
            let rows: Vec<(String, String, String)> = sqlx::query_as(
                "SELECT imei.imei_norm, imei.imsi, msisdn.msisdn
                 FROM observed_imei_imsi imei
                 JOIN observed_imei_msisdn msisdn
                   ON msisdn.imei_norm = imei.imei_norm AND msisdn.operator_id = $1
                 WHERE imei.imei_norm = ANY($2)
                   AND imei.observed_date > now() - ($3 || ' days')::interval",
            )
            .bind(operator_id)
            .bind(candidate_imeis)
            .bind(lookback_days.to_string())
            .fetch_all(pool)
            .await
            .map_err(DbError::QueryError)?;

            for (imei, imsi, msisdn) in rows {
                pairs.entry(imei).or_default().push((imsi, msisdn));
            }
        }

        let pairing_rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT imei_norm, imsi FROM historic_pairing_list
             WHERE operator_id = $1 AND end_date IS NULL",
        )
        .bind(operator_id)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryError)?;

        let live_pairs: HashSet<(String, String)> = pairing_rows.iter().cloned().collect();
        let mut pairing_list = HashMap::new();
        pairing_list.insert(operator_id.to_string(), pairing_rows);

        let barred_rows: Vec<(String,)> = sqlx::query_as(
            "SELECT imei_norm FROM historic_barred_list WHERE operator_id = $1 AND end_date IS NULL",
        )
        .bind(operator_id)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryError)?;
        let mut barred = HashMap::new();
        barred.insert(operator_id.to_string(), barred_rows.into_iter().map(|(i,)| i).collect());

        Ok(Self {
            pairs,
            live_pairs,
            pairing_list,
            barred,
        })
    }
}

impl ListgenSource for PgListgenSnapshot {
    fn observed_pairs(
        &self,
        _operator_id: &str,
        imei_norm: &str,
        _lookback_days: u32,
    ) -> Vec<(String, String)> {
        self.pairs.get(imei_norm).cloned().unwrap_or_default()
    }

    fn is_live_paired(&self, imei_norm: &str, imsi: &str) -> bool {
        self.live_pairs.contains(&(imei_norm.to_string(), imsi.to_string()))
    }

    fn live_pairing_list(&self, operator_id: &str) -> Vec<(String, String)> {
        self.pairing_list.get(operator_id).cloned().unwrap_or_default()
    }

    fn barred_imeis(&self, operator_id: &str) -> Vec<String> {
        self.barred.get(operator_id).cloned().unwrap_or_default()
    }
}
