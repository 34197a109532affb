//! `whitelist` (SPEC_FULL.md §4.6 "side effect hooks"): the Kafka
//! distributor's local side of `historic_whitelist`'s change feed.

use crate::cli::WhitelistAction;
use crate::error::DirbsError;
use dirbs_infra_db::drain_whitelist_notifications;
use std::time::Duration;
use tracing::info;

pub async fn run(database_url: &str, action: &WhitelistAction) -> Result<(), DirbsError> {
    match action {
        WhitelistAction::Process => {
            info!("whitelist process is a no-op placeholder; nothing to do");
        }
        WhitelistAction::Distribute { window_seconds } => {
            let payloads = drain_whitelist_notifications(database_url, Duration::from_secs(*window_seconds)).await?;
            for imei_norm in &payloads {
                info!(imei_norm, "would forward whitelist change to distributor");
            }
            info!(count = payloads.len(), "whitelist distribute complete");
        }
    }
    Ok(())
}
