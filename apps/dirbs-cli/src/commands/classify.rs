//! `classify` (C7, SPEC_FULL.md §4.7): per-shard dimension evaluation,
//! the safety-ratio gate, and state reconciliation against
//! `classification_state`.

use crate::error::DirbsError;
use chrono::{NaiveDate, TimeZone, Utc};
use dirbs_core_shard::VIRT_SHARD_COUNT;
use dirbs_domain_classify::{check_safety_ratio, reconcile, AmnestyPolicy};
use dirbs_domain_conditions::{evaluate, Condition};
use dirbs_domain_models::classification::ClassificationState;
use dirbs_infra_db::{lock_keys, ClassificationStateRepository, DbClient, JobRepository, PgShardSnapshot};
use dirbs_shared_runtime::RunContext;
use std::path::Path;
use tracing::{info, instrument, warn};

#[allow(clippy::too_many_arguments)]
#[instrument(skip(ctx, db), fields(no_safety_check))]
pub async fn run(
    ctx: &RunContext,
    db: &DbClient,
    no_safety_check: bool,
    conditions_path: Option<&Path>,
    command_line: &str,
) -> Result<(), DirbsError> {
    let conditions = match conditions_path {
        Some(path) => dirbs_shared_runtime::load_conditions_file(path)?,
        None => ctx.config.conditions.clone(),
    };

    let job_repo = JobRepository::new(db.pool().clone());
    let run_id = job_repo
        .start("classify", None, &ctx.config.db.user, command_line)
        .await?;

    match classify_inner(ctx, db, &conditions, no_safety_check).await {
        Ok(skipped) => {
            job_repo
                .annotate(run_id, serde_json::json!({ "conditions_skipped": skipped }))
                .await?;
            job_repo.mark_success(run_id).await?;
            if !skipped.is_empty() && !no_safety_check {
                return Err(DirbsError::Internal(format!(
                    "conditions skipped by the safety-ratio gate: {}",
                    skipped.join(", ")
                )));
            }
            Ok(())
        }
        Err(err) => {
            job_repo.mark_error(run_id, &err.to_string()).await?;
            ctx.metrics.unknown_exception("classify");
            Err(err)
        }
    }
}

async fn classify_inner(
    ctx: &RunContext,
    db: &DbClient,
    conditions: &[Condition],
    no_safety_check: bool,
) -> Result<Vec<String>, DirbsError> {
    let mut conn = db.pool().acquire().await.map_err(dirbs_infra_db::DbError::QueryError)?;
    DbClient::advisory_lock(&mut *conn, lock_keys::CLASSIFY).await?;

    let result = classify_locked(ctx, db, conditions, no_safety_check).await;

    DbClient::advisory_unlock(&mut *conn, lock_keys::CLASSIFY).await?;
    drop(conn);

    result
}

async fn classify_locked(
    ctx: &RunContext,
    db: &DbClient,
    conditions: &[Condition],
    no_safety_check: bool,
) -> Result<Vec<String>, DirbsError> {
    let state_repo = ClassificationStateRepository::new(db.pool().clone());
    let amnesty = ctx.config.amnesty.as_ref().map(|cfg| AmnestyPolicy {
        cutoff_date: midnight(cfg.cutoff_date),
        amnesty_end_date: midnight(cfg.amnesty_end_date),
    });
    let lookback_days = ctx.config.listgen.lookback_days;
    let run_start_time = ctx.now();

    let mut skipped = Vec::new();

    for shard in 0..VIRT_SHARD_COUNT {
        let snapshot = PgShardSnapshot::load(db.pool(), shard, lookback_days).await?;
        let universe: Vec<String> = snapshot.observed().to_vec();

        for condition in conditions {
            let result = evaluate(condition, &universe, &snapshot);

            if let Err(violation) = check_safety_ratio(condition, &result) {
                if no_safety_check {
                    warn!(condition = %condition.label, shard, %violation, "safety ratio exceeded, continuing (--no-safety-check)");
                } else {
                    warn!(condition = %condition.label, shard, %violation, "safety ratio exceeded, skipping condition for this shard");
                    skipped.push(condition.label.clone());
                    continue;
                }
            }

            let open_rows: Vec<ClassificationState> = state_repo.open_rows(&condition.label, shard, shard).await?;

            let outcome = reconcile(
                condition,
                &result.matching_set,
                &open_rows,
                run_start_time,
                amnesty.as_ref(),
                |_imei_norm| shard,
                |imei_norm| snapshot.observed_before(imei_norm, amnesty.as_ref().map_or(run_start_time, |a| a.cutoff_date)),
            );

            state_repo.apply_outcome(&outcome).await?;
            ctx.metrics.incr(&format!("classify.{}.opened", condition.label));
        }
    }

    info!(shards = VIRT_SHARD_COUNT, conditions = conditions.len(), "classification run complete");
    Ok(skipped)
}

fn midnight(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
}
