//! `prune` (SPEC_FULL.md §4 "Supplemented features"): deletes historic
//! rows closed before the configured retention window, across every
//! historic list kind.

use crate::error::DirbsError;
use dirbs_infra_db::{
    DbClient, HistoricBarredListRepository, HistoricListKind, HistoricListRepository,
    HistoricPairingListRepository, JobRepository,
};
use dirbs_shared_runtime::RunContext;
use tracing::info;

const SINGLE_KEY_KINDS: [HistoricListKind; 4] = [
    HistoricListKind::Stolen,
    HistoricListKind::Registration,
    HistoricListKind::GsmaTac,
    HistoricListKind::Whitelist,
];

pub async fn run(ctx: &RunContext, db: &DbClient, command_line: &str) -> Result<(), DirbsError> {
    let job_repo = JobRepository::new(db.pool().clone());
    let run_id = job_repo.start("prune", None, &ctx.config.db.user, command_line).await?;

    match prune_inner(ctx, db).await {
        Ok(deleted) => {
            job_repo.annotate(run_id, serde_json::json!({ "rows_deleted": deleted })).await?;
            job_repo.mark_success(run_id).await?;
            info!(run_id, deleted, "prune complete");
            Ok(())
        }
        Err(err) => {
            job_repo.mark_error(run_id, &err.to_string()).await?;
            ctx.metrics.unknown_exception("prune");
            Err(err)
        }
    }
}

async fn prune_inner(ctx: &RunContext, db: &DbClient) -> Result<u64, DirbsError> {
    let cutoff = ctx.now() - chrono::Duration::days(ctx.config.prune.retention_days);
    let mut deleted = 0u64;

    for kind in SINGLE_KEY_KINDS {
        let repo = HistoricListRepository::new(db.pool().clone(), kind);
        deleted += repo.prune_closed_before(cutoff).await?;
    }

    deleted += HistoricPairingListRepository::new(db.pool().clone())
        .prune_closed_before(cutoff)
        .await?;
    deleted += HistoricBarredListRepository::new(db.pool().clone())
        .prune_closed_before(cutoff)
        .await?;

    Ok(deleted)
}
