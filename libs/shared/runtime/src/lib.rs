//! Ambient runtime (SPEC_FULL.md §3, §9): configuration loading, tracing
//! initialization with panic capture, a non-blocking statsd client, a
//! clock abstraction, and the `RunContext` bundle passed explicitly into
//! every component instead of module-level singletons.

pub mod clock;
pub mod config;
pub mod context;
pub mod metrics;
pub mod tracing_init;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    load_conditions_file, AmnestyConfig, ConfigError, DbConfig, ImporterThresholdConfig,
    ListgenRunConfig, MultiprocessingConfig, PruneConfig, RunConfig, StatsdConfig,
};
pub use context::RunContext;
pub use metrics::{Metrics, MetricsError};
pub use tracing_init::init_tracing;
