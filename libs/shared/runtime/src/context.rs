//! `RunContext`: the explicit bundle every component takes instead of
//! reaching for module-level state (SPEC_FULL.md §9).

use crate::clock::Clock;
use crate::config::RunConfig;
use crate::metrics::Metrics;
use std::sync::Arc;

/// Passed by value (it's cheap to clone: an `Arc` plus a run id and a
/// clock trait object) into every component that needs config, metrics,
/// or the current time.
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<RunConfig>,
    pub metrics: Arc<Metrics>,
    pub run_id: i64,
    pub clock: Arc<dyn Clock>,
}

impl RunContext {
    #[must_use]
    pub fn new(config: RunConfig, metrics: Metrics, run_id: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            metrics: Arc::new(metrics),
            run_id,
            clock,
        }
    }

    #[must_use]
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}
