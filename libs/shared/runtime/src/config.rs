//! Layered configuration (SPEC_FULL.md §3 "Config", §6): defaults ->
//! YAML file at `DIRBS_CONFIG_FILE` or a default search path ->
//! environment overrides prefixed `DIRBS_`.

use dirbs_domain_models::condition::Condition;
use dirbs_domain_models::operator::Operator;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read conditions file {path}: {source}")]
    ConditionsFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse conditions file {path}: {source}")]
    ConditionsFileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_max_db_connections")]
    pub max_connections: u32,
}

fn default_max_db_connections() -> u32 {
    4
}

impl DbConfig {
    #[must_use]
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct StatsdConfig {
    pub host: Option<String>,
    #[serde(default = "default_statsd_port")]
    pub port: u16,
    #[serde(default)]
    pub env: Option<String>,
}

fn default_statsd_port() -> u16 {
    8125
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MultiprocessingConfig {
    #[serde(default = "default_max_local_cpus")]
    pub max_local_cpus: usize,
}

impl Default for MultiprocessingConfig {
    fn default() -> Self {
        Self {
            max_local_cpus: default_max_local_cpus(),
        }
    }
}

fn default_max_local_cpus() -> usize {
    (num_cpus::get().saturating_sub(1)).max(1)
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct ImporterThresholdConfig {
    pub list_type: String,
    #[serde(default)]
    pub import_size_variation_absolute: u64,
    #[serde(default)]
    pub import_size_variation_percent: f64,
    #[serde(default)]
    pub import_batch_size: usize,
    #[serde(default = "default_delta_sanity_ratio")]
    pub max_delta_violation_ratio: f64,
    /// Max tolerated fraction of rows whose IMSI falls outside every
    /// configured operator's MCC+MNC prefix set (SPEC_FULL.md §4.5.1).
    #[serde(default = "default_out_of_prefix_ratio")]
    pub max_out_of_prefix_ratio: f64,
}

fn default_out_of_prefix_ratio() -> f64 {
    1.0
}

fn default_delta_sanity_ratio() -> f64 {
    0.05
}

/// Optional amnesty window (SPEC_FULL.md §4.7 step 4). Absent means no
/// IMEI is ever amnesty-eligible regardless of a condition's
/// `amnesty_eligible` flag.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AmnestyConfig {
    pub cutoff_date: chrono::NaiveDate,
    pub amnesty_end_date: chrono::NaiveDate,
}

/// Listgen-time settings (SPEC_FULL.md §4.8), one set applying to every
/// operator rather than per-operator overrides.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ListgenRunConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default)]
    pub restrict_exceptions_list_to_blacklisted_imeis: bool,
    #[serde(default)]
    pub augment_exceptions_with_barred_list: bool,
    #[serde(default = "default_sanity_variance_ratio")]
    pub max_sanity_variance_ratio: f64,
    #[serde(default)]
    pub operators: Vec<String>,
}

fn default_lookback_days() -> u32 {
    90
}

fn default_sanity_variance_ratio() -> f64 {
    0.25
}

impl Default for ListgenRunConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            restrict_exceptions_list_to_blacklisted_imeis: false,
            augment_exceptions_with_barred_list: false,
            max_sanity_variance_ratio: default_sanity_variance_ratio(),
            operators: Vec::new(),
        }
    }
}

/// Historic-row retention window for the `prune` subcommand's mechanism
/// (SPEC_FULL.md §4 "Supplemented features").
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PruneConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_retention_days() -> i64 {
    365
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

/// Top-level configuration, deserialized once at startup.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub statsd: StatsdConfig,
    #[serde(default)]
    pub multiprocessing: MultiprocessingConfig,
    #[serde(default)]
    pub importers: Vec<ImporterThresholdConfig>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Configured operators and the MCC+MNC prefixes each owns, used by
    /// the importer's out-of-prefix row invariant (SPEC_FULL.md §4.5.1)
    /// and by `listgen`'s per-operator iteration.
    #[serde(default)]
    pub operators: Vec<Operator>,
    #[serde(default)]
    pub amnesty: Option<AmnestyConfig>,
    #[serde(default)]
    pub listgen: ListgenRunConfig,
    #[serde(default)]
    pub prune: PruneConfig,
}

/// Loads `RunConfig` layering, in increasing priority: built-in
/// defaults, the YAML file named by `DIRBS_CONFIG_FILE` (falling back to
/// `~/.dirbs.yml` then `/opt/dirbs/etc/config.yml`), then `DIRBS_`-prefixed
/// environment variables.
///
/// # Errors
/// Returns [`ConfigError`] if the layered sources don't deserialize into
/// `RunConfig` (missing required fields, type mismatches). This is the
/// only place a startup configuration problem surfaces; per
/// SPEC_FULL.md §3, config errors are always fatal at startup, never
/// raised mid-run.
pub fn load() -> Result<RunConfig, ConfigError> {
    let mut builder = config::Config::builder().set_default("multiprocessing.max_local_cpus", default_max_local_cpus() as i64)?;

    if let Some(path) = config_file_path() {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(config::Environment::with_prefix("DIRBS").separator("_"));

    let config = builder.build()?;
    Ok(config.try_deserialize()?)
}

/// Loads conditions from an explicit file, for the CLI's
/// `--conditions=PATH` override (SPEC_FULL.md §6), which takes
/// precedence over `RunConfig::conditions` when given.
pub fn load_conditions_file(path: &Path) -> Result<Vec<Condition>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ConditionsFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::ConditionsFileParse {
        path: path.to_path_buf(),
        source,
    })
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("DIRBS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }
    if let Some(home) = std::env::var_os("HOME") {
        let candidate = PathBuf::from(home).join(".dirbs.yml");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    let opt_path = PathBuf::from("/opt/dirbs/etc/config.yml");
    if opt_path.exists() {
        return Some(opt_path);
    }
    None
}
