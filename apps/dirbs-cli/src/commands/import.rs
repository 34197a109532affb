//! `import <list_type> <file>` (C3-C6, SPEC_FULL.md §4.3-§4.6): pre-validate,
//! stage, threshold-guard, then apply a delta against the live historic
//! state for one of the registered list types.

use crate::error::DirbsError;
use crate::list_registry::{self, ListTypeDef, Storage};
use dirbs_infra_db::{
    DataCatalogRepository, DbClient, GsmaTacPayload, HistoricBarredListRepository,
    HistoricListKind, HistoricListRepository, HistoricPairingListRepository, JobRepository,
};
use dirbs_infra_importer::normalize::{derive_imei_shard, derive_rat_bitmask};
use dirbs_infra_importer::threshold::{
    check_delta_sanity, check_historic_size_variation, check_row_invariants, RowInvariantConfig,
};
use dirbs_infra_importer::{compute_delta, load_staging_rows, primary_key, ImportMode, ImportRow};
use dirbs_infra_validation::{check_operator_filename, split_into_batches, unwrap_zip, validate_csv};
use dirbs_shared_runtime::RunContext;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

#[allow(clippy::too_many_arguments)]
#[instrument(skip(ctx, db), fields(list_type))]
pub async fn run(
    ctx: &RunContext,
    db: &DbClient,
    list_type: &str,
    file: &Path,
    delta: bool,
    operator: Option<&str>,
    command_line: &str,
) -> Result<(), DirbsError> {
    let def = list_registry::lookup(list_type)
        .ok_or_else(|| DirbsError::Usage(format!("unknown list type {list_type:?}")))?;

    let job_repo = JobRepository::new(db.pool().clone());
    let run_id = job_repo
        .start("import", Some(list_type), &ctx.config.db.user, command_line)
        .await?;

    match import_inner(ctx, db, def, file, delta, operator).await {
        Ok(summary) => {
            job_repo
                .annotate(
                    run_id,
                    serde_json::json!({
                        "added": summary.added,
                        "removed": summary.removed,
                        "staged_rows": summary.staged_rows,
                    }),
                )
                .await?;
            job_repo.mark_success(run_id).await?;
            info!(run_id, added = summary.added, removed = summary.removed, "import complete");
            Ok(())
        }
        Err(err) => {
            job_repo.mark_error(run_id, &err.to_string()).await?;
            ctx.metrics.unknown_exception("import");
            Err(err)
        }
    }
}

struct ImportSummary {
    staged_rows: u64,
    added: usize,
    removed: usize,
}

async fn import_inner(
    ctx: &RunContext,
    db: &DbClient,
    def: &ListTypeDef,
    file: &Path,
    delta: bool,
    operator: Option<&str>,
) -> Result<ImportSummary, DirbsError> {
    let work_dir = tempfile::tempdir()?;

    let operator_id = resolve_operator(def, file, operator, ctx)?;

    let csv_path = if file.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip")) {
        unwrap_zip(file, work_dir.path())?
    } else {
        file.to_path_buf()
    };

    record_catalog_observation(db, file, &csv_path).await?;

    let reader = csv::ReaderBuilder::new().has_headers(true).from_path(&csv_path)?;
    if let Err(err) = validate_csv(def.schema, reader, delta) {
        ctx.metrics.validation_failure(def.list_type, operator_id.as_deref(), "schema");
        return Err(err.into());
    }

    let threshold_config = ctx
        .config
        .importers
        .iter()
        .find(|c| c.list_type == def.list_type);
    let batch_size = threshold_config.map(|c| c.import_batch_size).filter(|n| *n > 0).unwrap_or(50_000);

    let batch_dir = tempfile::tempdir()?;
    let batches = split_into_batches(&csv_path, batch_dir.path(), batch_size)?;

    let imei_column = def.imei_column;
    let rows = load_staging_rows(&batches, |row| {
        if let Some(col) = imei_column {
            derive_imei_shard(row, col);
        }
        derive_rat_bitmask(row);
    })?;

    let row_invariant_config = threshold_config.map(|c| RowInvariantConfig {
        max_out_of_prefix_ratio: c.max_out_of_prefix_ratio,
        ..RowInvariantConfig::default()
    });
    check_row_invariants(
        &rows,
        imei_column,
        def.imsi_column,
        &ctx.config.operators.iter().flat_map(|op| op.mcc_mnc_prefixes.clone()).collect::<Vec<_>>(),
        &row_invariant_config.unwrap_or_default(),
    )?;

    let live = load_live_snapshot(db, def, operator_id.as_deref()).await?;

    let mode = if delta { ImportMode::Delta } else { ImportMode::FullSnapshot };
    let staged_for_delta: Vec<ImportRow> = rows.iter().map(|r| pk_only(r, def.pk_columns)).collect();
    let (plan, violations) = compute_delta(&staged_for_delta, &live, def.pk_columns, mode);

    let total_staged = rows.len() as u64;
    check_delta_sanity(violations, total_staged, threshold_config.map_or(0.05, |c| c.max_delta_violation_ratio))?;

    let projected = (live.len() as i64 - plan.remove.len() as i64 + plan.add.len() as i64).max(0) as u64;
    let (max_abs, max_pct) = threshold_config
        .map(|c| (c.import_size_variation_absolute, c.import_size_variation_percent))
        .unwrap_or((u64::MAX, 1.0));
    check_historic_size_variation(live.len() as u64, projected, max_abs, max_pct)?;

    apply_plan(db, def, operator_id.as_deref(), &live, &rows, &plan, ctx.now()).await?;

    ctx.metrics.incr(&format!("import.{}.rows_staged", def.list_type));

    Ok(ImportSummary {
        staged_rows: total_staged,
        added: plan.add.len(),
        removed: plan.remove.len(),
    })
}

/// Derives the canonical operator id for an operator-scoped list type,
/// cross-checking the filename convention against an explicit
/// `--operator` flag when both are present.
fn resolve_operator(
    def: &ListTypeDef,
    file: &Path,
    operator: Option<&str>,
    ctx: &RunContext,
) -> Result<Option<String>, DirbsError> {
    if !def.requires_operator {
        return Ok(None);
    }

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| DirbsError::Usage(format!("non-UTF8 file name {file:?}")))?;
    let window = check_operator_filename(stem, ctx.now().date_naive())?;

    if let Some(explicit) = operator {
        if explicit != window.operator_id {
            return Err(DirbsError::Usage(format!(
                "--operator {explicit:?} does not match filename operator id {:?}",
                window.operator_id
            )));
        }
    }

    Ok(Some(window.operator_id))
}

async fn record_catalog_observation(db: &DbClient, original: &Path, resolved_csv: &Path) -> Result<(), DirbsError> {
    let bytes = std::fs::read(resolved_csv)?;
    let mut hasher = Md5::new();
    hasher.update(&bytes);
    let md5_hex = hex::encode(hasher.finalize());

    let filename = original
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    DataCatalogRepository::new(db.pool().clone())
        .record_observation(&filename, &md5_hex, bytes.len() as i64, true)
        .await?;
    Ok(())
}

/// Retains only `pk_columns` (and `change_type`, for delta mode) from
/// `row`, so the delta computation compares against the live snapshot's
/// key-only representation rather than spuriously flagging every
/// staged row as an update.
fn pk_only(row: &ImportRow, pk_columns: &[&str]) -> ImportRow {
    let mut out = ImportRow::default();
    for col in pk_columns {
        if let Some(value) = row.get(col) {
            out.set(col, value.to_string());
        }
    }
    if let Some(change_type) = row.get("change_type") {
        out.set("change_type", change_type.to_string());
    }
    out
}

async fn load_live_snapshot(
    db: &DbClient,
    def: &ListTypeDef,
    operator_id: Option<&str>,
) -> Result<BTreeMap<String, ImportRow>, DirbsError> {
    let entries: Vec<ImportRow> = match def.storage {
        Storage::Historic(kind) => {
            let repo = HistoricListRepository::new(db.pool().clone(), kind);
            repo.live_keys()
                .await?
                .into_iter()
                .map(|key| {
                    let mut row = ImportRow::default();
                    row.set(def.pk_columns[0], key);
                    row
                })
                .collect()
        }
        Storage::Pairing => {
            let operator_id = operator_id.ok_or_else(|| {
                DirbsError::Usage("pairing_list import requires --operator".to_string())
            })?;
            let repo = HistoricPairingListRepository::new(db.pool().clone());
            repo.live_pairs(operator_id)
                .await?
                .into_iter()
                .map(|(imei_norm, imsi)| {
                    let mut row = ImportRow::default();
                    row.set("imei_norm", imei_norm);
                    row.set("imsi", imsi);
                    row
                })
                .collect()
        }
        Storage::Barred => {
            let operator_id = operator_id.ok_or_else(|| {
                DirbsError::Usage("barred_list import requires --operator".to_string())
            })?;
            let repo = HistoricBarredListRepository::new(db.pool().clone());
            repo.live_imeis(operator_id)
                .await?
                .into_iter()
                .map(|imei_norm| {
                    let mut row = ImportRow::default();
                    row.set("imei_norm", imei_norm);
                    row
                })
                .collect()
        }
    };

    Ok(entries
        .into_iter()
        .map(|row| (primary_key(&row, def.pk_columns), row))
        .collect())
}

async fn apply_plan(
    db: &DbClient,
    def: &ListTypeDef,
    operator_id: Option<&str>,
    live: &BTreeMap<String, ImportRow>,
    staged_rows: &[ImportRow],
    plan: &dirbs_infra_importer::DeltaPlan,
    as_of: chrono::DateTime<chrono::Utc>,
) -> Result<(), DirbsError> {
    match def.storage {
        Storage::Historic(HistoricListKind::GsmaTac) => {
            let repo = HistoricListRepository::new(db.pool().clone(), HistoricListKind::GsmaTac);
            let full_by_tac: BTreeMap<String, &ImportRow> = staged_rows
                .iter()
                .filter_map(|r| Some((r.get("tac")?.to_string(), r)))
                .collect();
            let added: Vec<GsmaTacPayload> = plan
                .add
                .iter()
                .filter_map(|r| r.get("tac"))
                .filter_map(|tac| {
                    let full = full_by_tac.get(tac)?;
                    Some(GsmaTacPayload {
                        tac: tac.to_string(),
                        rat_bitmask: full.get("rat_bitmask").and_then(|v| v.parse().ok()).unwrap_or(0),
                        manufacturer: full.get("manufacturer").unwrap_or_default().to_string(),
                        model_name: full.get("model_name").unwrap_or_default().to_string(),
                        device_type: full.get("device_type").unwrap_or_default().to_string(),
                    })
                })
                .collect();
            repo.apply_gsma_delta(&added, &plan.remove, as_of).await?;
        }
        Storage::Historic(kind) => {
            let repo = HistoricListRepository::new(db.pool().clone(), kind);
            let key_col = def.pk_columns[0];
            let added: Vec<String> = plan.add.iter().filter_map(|r| r.get(key_col)).map(str::to_string).collect();
            repo.apply_delta(&added, &plan.remove, as_of).await?;
        }
        Storage::Barred => {
            let operator_id = operator_id.expect("checked in load_live_snapshot");
            let repo = HistoricBarredListRepository::new(db.pool().clone());
            let added: Vec<String> = plan.add.iter().filter_map(|r| r.get("imei_norm")).map(str::to_string).collect();
            repo.apply_delta(operator_id, &added, &plan.remove, as_of).await?;
        }
        Storage::Pairing => {
            let operator_id = operator_id.expect("checked in load_live_snapshot");
            let repo = HistoricPairingListRepository::new(db.pool().clone());
            let added: Vec<(String, String)> = plan
                .add
                .iter()
                .filter_map(|r| Some((r.get("imei_norm")?.to_string(), r.get("imsi")?.to_string())))
                .collect();
            let removed: Vec<(String, String)> = plan
                .remove
                .iter()
                .filter_map(|pk| {
                    let row = live.get(pk)?;
                    Some((row.get("imei_norm")?.to_string(), row.get("imsi")?.to_string()))
                })
                .collect();
            repo.apply_delta(operator_id, &added, &removed, as_of).await?;
        }
    }

    Ok(())
}
