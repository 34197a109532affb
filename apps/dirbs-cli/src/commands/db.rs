//! `db` (SPEC_FULL.md §4.1, §6): schema lifecycle and physical repartitioning.

use crate::cli::DbAction;
use crate::error::DirbsError;
use dirbs_core_shard::partition::PartitionPlan;
use dirbs_infra_db::{repartition, schema, DbClient};
use tracing::info;

pub async fn run(db: &DbClient, action: &DbAction) -> Result<(), DirbsError> {
    match action {
        DbAction::Check => {
            let up_to_date = schema::check(db.pool()).await?;
            if up_to_date {
                info!("schema up to date");
            } else {
                return Err(DirbsError::Usage("schema is not up to date; run `db upgrade`".to_string()));
            }
        }
        DbAction::Upgrade => {
            let version = schema::upgrade(db.pool()).await?;
            info!(version, "schema upgraded");
        }
        DbAction::Install => {
            let version = schema::install(db.pool()).await?;
            info!(version, "schema installed");
        }
        DbAction::Repartition {
            base_table,
            num_physical_shards,
        } => {
            if *num_physical_shards == 0 || *num_physical_shards > dirbs_core_shard::VIRT_SHARD_COUNT {
                return Err(DirbsError::Usage(format!(
                    "--num-physical-shards must be between 1 and {}",
                    dirbs_core_shard::VIRT_SHARD_COUNT
                )));
            }
            let plan = PartitionPlan::even(*num_physical_shards);
            repartition(db.pool(), base_table, &plan).await?;
            info!(base_table, num_physical_shards, "repartition complete");
        }
    }
    Ok(())
}
