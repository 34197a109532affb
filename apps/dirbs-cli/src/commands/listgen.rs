//! `listgen <output_dir>` (C8, SPEC_FULL.md §4.8): derives the blacklist
//! and every operator's notifications/exceptions lists from open
//! classification state, optionally diffing against a base run.

use crate::error::DirbsError;
use dirbs_domain_listgen::{
    delta_blacklist, delta_exceptions, delta_notifications, derive_blacklist, derive_exceptions,
    derive_notifications, exceeds_sanity_variance, ListgenConfig,
};
use dirbs_domain_models::classification::ClassificationState;
use dirbs_domain_models::condition::Condition;
use dirbs_domain_models::list::{ExceptionRow, ListSortKey, NotificationRow};
use dirbs_infra_db::{
    lock_keys, ClassificationStateRepository, DbClient, JobRepository, ListgenOutputRepository,
    PgListgenSnapshot,
};
use dirbs_shared_runtime::RunContext;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument};

#[allow(clippy::too_many_arguments)]
#[instrument(skip(ctx, db), fields(base))]
pub async fn run(
    ctx: &RunContext,
    db: &DbClient,
    output_dir: &Path,
    base: Option<i64>,
    no_full_lists: bool,
    no_cleanup: bool,
    disable_sanity_checks: bool,
    conditions_path: Option<&Path>,
    command_line: &str,
) -> Result<(), DirbsError> {
    let conditions = match conditions_path {
        Some(path) => dirbs_shared_runtime::load_conditions_file(path)?,
        None => ctx.config.conditions.clone(),
    };

    let job_repo = JobRepository::new(db.pool().clone());
    let run_id = job_repo
        .start("listgen", None, &ctx.config.db.user, command_line)
        .await?;

    match listgen_inner(
        ctx,
        db,
        &conditions,
        output_dir,
        base,
        no_full_lists,
        no_cleanup,
        disable_sanity_checks,
        run_id,
    )
    .await
    {
        Ok(counts) => {
            job_repo.annotate(run_id, counts).await?;
            job_repo.mark_success(run_id).await?;
            info!(run_id, "listgen complete");
            Ok(())
        }
        Err(err) => {
            job_repo.mark_error(run_id, &err.to_string()).await?;
            ctx.metrics.unknown_exception("listgen");
            Err(err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn listgen_inner(
    ctx: &RunContext,
    db: &DbClient,
    conditions: &[Condition],
    output_dir: &Path,
    base: Option<i64>,
    no_full_lists: bool,
    no_cleanup: bool,
    disable_sanity_checks: bool,
    run_id: i64,
) -> Result<serde_json::Value, DirbsError> {
    let mut conn = db.pool().acquire().await.map_err(dirbs_infra_db::DbError::QueryError)?;
    DbClient::advisory_lock(&mut *conn, lock_keys::LISTGEN).await?;

    let result = listgen_locked(ctx, db, conditions, output_dir, base, no_full_lists, no_cleanup, disable_sanity_checks, run_id).await;

    DbClient::advisory_unlock(&mut *conn, lock_keys::LISTGEN).await?;
    drop(conn);

    result
}

#[allow(clippy::too_many_arguments)]
async fn listgen_locked(
    ctx: &RunContext,
    db: &DbClient,
    conditions: &[Condition],
    output_dir: &Path,
    base: Option<i64>,
    no_full_lists: bool,
    no_cleanup: bool,
    disable_sanity_checks: bool,
    run_id: i64,
) -> Result<serde_json::Value, DirbsError> {
    let state_repo = ClassificationStateRepository::new(db.pool().clone());
    let output_repo = ListgenOutputRepository::new(db.pool().clone());
    let run_date = ctx.now();

    let open_rows: Vec<ClassificationState> = state_repo.all_open_rows().await?;
    let blacklist = derive_blacklist(&open_rows, conditions, run_date, run_id);
    let blacklisted_imeis: HashSet<String> = blacklist.iter().map(|r| r.imei_norm.clone()).collect();

    let listgen_config = ListgenConfig {
        lookback_days: ctx.config.listgen.lookback_days,
        restrict_exceptions_list_to_blacklisted_imeis: ctx.config.listgen.restrict_exceptions_list_to_blacklisted_imeis,
        augment_exceptions_with_barred_list: ctx.config.listgen.augment_exceptions_with_barred_list,
    };

    // Phase 1: derive every list and every delta, and run every sanity
    // check against them, without writing any output yet. Per
    // SPEC_FULL.md §7, a sanity-variance failure must leave no CSV or
    // DB output behind, so the gate below has to run before any write.
    let mut delta_violation: Option<(usize, usize, f64)> = None;

    let blacklist_delta = if let Some(base_run_id) = base {
        let base_blacklist = output_repo.base_blacklist(base_run_id).await?;
        let delta = delta_blacklist(&blacklist, &base_blacklist, run_id);
        check_sanity(&delta, base_blacklist.len(), ctx.config.listgen.max_sanity_variance_ratio, disable_sanity_checks, &mut delta_violation);
        Some(delta)
    } else {
        None
    };

    let mut operator_work = Vec::new();
    for operator_id in &ctx.config.listgen.operators {
        output_repo.ensure_operator_tables(operator_id).await?;

        let candidate_imeis: Vec<String> = open_rows
            .iter()
            .filter(|row| row.is_pending_as_of(run_date))
            .map(|row| row.imei_norm.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let snapshot = PgListgenSnapshot::load(
            db.pool(),
            operator_id,
            &candidate_imeis,
            listgen_config.lookback_days,
        )
        .await?;

        let notifications = derive_notifications(
            &open_rows,
            conditions,
            &snapshot,
            operator_id,
            run_date,
            run_id,
            &listgen_config,
        );
        let exceptions = derive_exceptions(&snapshot, operator_id, &blacklisted_imeis, run_id, &listgen_config);

        let live_notifications = output_repo.live_notifications(operator_id).await?;
        let live_exceptions = output_repo.live_exceptions(operator_id).await?;

        let deltas = if let Some(base_run_id) = base {
            let base_notifications = output_repo.base_notifications(operator_id, base_run_id).await?;
            let base_exceptions = output_repo.base_exceptions(operator_id, base_run_id).await?;
            let notification_delta = delta_notifications(&notifications, &base_notifications, &blacklist, run_id);
            let exception_delta = delta_exceptions(&exceptions, &base_exceptions, run_id);

            check_sanity(&notification_delta, base_notifications.len(), ctx.config.listgen.max_sanity_variance_ratio, disable_sanity_checks, &mut delta_violation);
            check_sanity(&exception_delta, base_exceptions.len(), ctx.config.listgen.max_sanity_variance_ratio, disable_sanity_checks, &mut delta_violation);

            Some((notification_delta, exception_delta))
        } else {
            None
        };

        operator_work.push(OperatorWork {
            operator_id: operator_id.clone(),
            notifications,
            exceptions,
            live_notifications,
            live_exceptions,
            deltas,
        });
    }

    if let Some((delta_len, base_len, max_ratio)) = delta_violation {
        return Err(DirbsError::ListgenSanity {
            delta: delta_len,
            base: base_len,
            max_ratio,
        });
    }

    // Phase 2: every sanity check passed (or was disabled); now it's
    // safe to write CSVs and reconcile the DB-backed output tables.
    std::fs::create_dir_all(output_dir)?;

    if !no_full_lists {
        write_sorted_csv(&output_dir.join("blacklist.csv"), &blacklist)?;
    }

    let live_blacklist = output_repo.live_blacklist().await?;
    let live_imeis: HashSet<&str> = live_blacklist.iter().map(|r| r.imei_norm.as_str()).collect();
    let new_rows: Vec<_> = blacklist
        .iter()
        .filter(|r| !live_imeis.contains(r.imei_norm.as_str()))
        .cloned()
        .collect();
    output_repo.write_blacklist(&new_rows).await?;
    if !no_cleanup {
        let retired_imeis: Vec<String> = live_blacklist
            .iter()
            .filter(|r| !blacklisted_imeis.contains(&r.imei_norm))
            .map(|r| r.imei_norm.clone())
            .collect();
        output_repo.close_blacklist(&retired_imeis, run_id).await?;
    }

    if let Some(blacklist_delta) = &blacklist_delta {
        write_sorted_csv(&output_dir.join("blacklist_delta.csv"), blacklist_delta)?;
    }

    let mut notification_counts = serde_json::Map::new();
    let mut exception_counts = serde_json::Map::new();

    for work in &operator_work {
        let operator_id = &work.operator_id;
        let live_notification_keys: HashSet<(&str, &str)> = work
            .live_notifications
            .iter()
            .map(|r| (r.imei_norm.as_str(), r.imsi.as_str()))
            .collect();
        let live_exception_keys: HashSet<(&str, &str)> = work
            .live_exceptions
            .iter()
            .map(|r| (r.imei_norm.as_str(), r.imsi.as_str()))
            .collect();

        if !no_full_lists {
            let new_notifications: Vec<_> = work
                .notifications
                .iter()
                .filter(|r| !live_notification_keys.contains(&(r.imei_norm.as_str(), r.imsi.as_str())))
                .cloned()
                .collect();
            let new_exceptions: Vec<_> = work
                .exceptions
                .iter()
                .filter(|r| !live_exception_keys.contains(&(r.imei_norm.as_str(), r.imsi.as_str())))
                .cloned()
                .collect();
            output_repo.write_notifications(operator_id, &new_notifications).await?;
            output_repo.write_exceptions(operator_id, &new_exceptions).await?;
            write_sorted_csv(&output_dir.join(format!("notifications_{operator_id}.csv")), &work.notifications)?;
            write_sorted_csv(&output_dir.join(format!("exceptions_{operator_id}.csv")), &work.exceptions)?;
        }
        notification_counts.insert(operator_id.clone(), work.notifications.len().into());
        exception_counts.insert(operator_id.clone(), work.exceptions.len().into());

        if !no_cleanup {
            let current_notification_keys: HashSet<(&str, &str)> = work
                .notifications
                .iter()
                .map(|r| (r.imei_norm.as_str(), r.imsi.as_str()))
                .collect();
            let retiring_notifications: Vec<(String, String)> = work
                .live_notifications
                .iter()
                .filter(|r| !current_notification_keys.contains(&(r.imei_norm.as_str(), r.imsi.as_str())))
                .map(|r| (r.imei_norm.clone(), r.imsi.clone()))
                .collect();
            output_repo.close_notifications(operator_id, &retiring_notifications, run_id).await?;

            let current_exception_keys: HashSet<(&str, &str)> = work
                .exceptions
                .iter()
                .map(|r| (r.imei_norm.as_str(), r.imsi.as_str()))
                .collect();
            let retiring_exceptions: Vec<(String, String)> = work
                .live_exceptions
                .iter()
                .filter(|r| !current_exception_keys.contains(&(r.imei_norm.as_str(), r.imsi.as_str())))
                .map(|r| (r.imei_norm.clone(), r.imsi.clone()))
                .collect();
            output_repo.close_exceptions(operator_id, &retiring_exceptions, run_id).await?;
        }

        if let Some((notification_delta, exception_delta)) = &work.deltas {
            write_sorted_csv(&output_dir.join(format!("notifications_{operator_id}_delta.csv")), notification_delta)?;
            write_sorted_csv(&output_dir.join(format!("exceptions_{operator_id}_delta.csv")), exception_delta)?;
        }

        ctx.metrics.gauge(&format!("listgen.{operator_id}.notifications"), work.notifications.len() as u64);
        ctx.metrics.gauge(&format!("listgen.{operator_id}.exceptions"), work.exceptions.len() as u64);
    }

    let manifest = serde_json::json!({
        "run_id": run_id,
        "base_run_id": base,
        "blacklist_count": blacklist.len(),
        "notifications": notification_counts,
        "exceptions": exception_counts,
    });
    std::fs::write(output_dir.join("manifest.json"), serde_json::to_vec_pretty(&manifest)?)?;

    ctx.metrics.gauge("listgen.blacklist", blacklist.len() as u64);
    info!(operators = ctx.config.listgen.operators.len(), blacklist = blacklist.len(), "listgen run complete");

    Ok(manifest)
}

struct OperatorWork {
    operator_id: String,
    notifications: Vec<NotificationRow>,
    exceptions: Vec<ExceptionRow>,
    live_notifications: Vec<NotificationRow>,
    live_exceptions: Vec<ExceptionRow>,
    deltas: Option<(Vec<NotificationRow>, Vec<ExceptionRow>)>,
}

/// Records the largest sanity-ratio violation seen so far, unless
/// `disable_sanity_checks` is set. Keeping only the largest means one
/// failing list doesn't mask a second, worse one in the final error.
fn check_sanity<T>(
    delta: &[T],
    base_len: usize,
    max_ratio: f64,
    disable_sanity_checks: bool,
    slot: &mut Option<(usize, usize, f64)>,
) {
    if disable_sanity_checks {
        return;
    }
    if exceeds_sanity_variance(delta.len(), base_len, max_ratio) {
        let candidate = (delta.len(), base_len, max_ratio);
        let worse = match slot.as_ref() {
            Some((d, b, _)) => ratio(delta.len(), base_len) > ratio(*d, *b),
            None => true,
        };
        if worse {
            *slot = Some(candidate);
        }
    }
}

fn ratio(delta_len: usize, base_len: usize) -> f64 {
    if base_len == 0 {
        f64::INFINITY
    } else {
        delta_len as f64 / base_len as f64
    }
}

fn write_sorted_csv<T: serde::Serialize + ListSortKey + Clone>(path: &Path, rows: &[T]) -> Result<(), DirbsError> {
    let mut sorted: Vec<T> = rows.to_vec();
    sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut writer = csv::Writer::from_path(path)?;
    for row in &sorted {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
