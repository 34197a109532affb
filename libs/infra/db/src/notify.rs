//! Drains `historic_whitelist_changes` notifications posted by
//! [`crate::repositories::HistoricListRepository::apply_delta`]
//! (SPEC_FULL.md §4.6 "side effect hooks").
//!
//! Actually forwarding these to Kafka is the whitelist distributor, a
//! named external collaborator (spec.md §1); this only drains what
//! Postgres already buffered on the channel, so `whitelist distribute`
//! has something real to log.

use crate::errors::DbError;
use sqlx::postgres::PgListener;
use std::time::Duration;
use tracing::{info, instrument};

pub const WHITELIST_CHANGES_CHANNEL: &str = "historic_whitelist_changes";

/// Listens on [`WHITELIST_CHANGES_CHANNEL`] for up to `window`, returning
/// every `imei_norm` payload received. Returns early once nothing new
/// arrives within `window`; never blocks indefinitely.
#[instrument(skip(database_url))]
pub async fn drain_whitelist_notifications(
    database_url: &str,
    window: Duration,
) -> Result<Vec<String>, DbError> {
    let mut listener = PgListener::connect(database_url)
        .await
        .map_err(DbError::QueryError)?;
    listener
        .listen(WHITELIST_CHANGES_CHANNEL)
        .await
        .map_err(DbError::QueryError)?;

    let mut payloads = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, listener.recv()).await {
            Ok(Ok(notification)) => payloads.push(notification.payload().to_string()),
            Ok(Err(e)) => return Err(DbError::QueryError(e)),
            Err(_elapsed) => break,
        }
    }

    info!(count = payloads.len(), "drained whitelist notifications");
    Ok(payloads)
}
