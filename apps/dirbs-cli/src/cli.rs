//! CLI surface (spec.md §6): subcommands, global flags, and the
//! `--curr-date=YYYYMMDD` clock pin shared by `classify` and `listgen`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dirbs-cli",
    version,
    about = "DIRBS Core: delta-aware bulk importer, classification engine, and listgen for a device identification, registration and blocking system."
)]
pub struct Cli {
    /// Increases log verbosity; repeatable is not supported, a single
    /// flag switches the default filter from info to debug.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[arg(long = "db-host", env = "DIRBS_DB_HOST", global = true)]
    pub db_host: Option<String>,

    #[arg(long = "db-port", env = "DIRBS_DB_PORT", global = true)]
    pub db_port: Option<u16>,

    #[arg(long = "db-name", env = "DIRBS_DB_DATABASE", global = true)]
    pub db_name: Option<String>,

    #[arg(long = "db-user", env = "DIRBS_DB_USER", global = true)]
    pub db_user: Option<String>,

    #[arg(long = "db-password", env = "DIRBS_DB_PASSWORD", global = true)]
    pub db_password: Option<String>,

    #[arg(long = "statsd-host", env = "DIRBS_STATSD_HOST", global = true)]
    pub statsd_host: Option<String>,

    #[arg(long = "statsd-port", env = "DIRBS_STATSD_PORT", global = true)]
    pub statsd_port: Option<u16>,

    #[arg(long = "max-local-cpus", global = true)]
    pub max_local_cpus: Option<usize>,

    #[arg(long = "max-db-connections", global = true)]
    pub max_db_connections: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Imports a list-type file (spec.md §4.3-§4.6).
    Import {
        /// One of the registered list types; see `list_registry`.
        list_type: String,
        /// Path to the submitted `.zip` (or already-unwrapped `.csv`).
        file: PathBuf,
        /// Delta-mode import: the CSV carries a `change_type` column.
        #[arg(long)]
        delta: bool,
        /// Operator id, required for per-operator list types (pairing,
        /// barred, operator network data).
        #[arg(long)]
        operator: Option<String>,
    },

    /// Runs the classification engine (C7).
    Classify {
        /// Skip the safety-ratio gate (spec.md §4.7 step 2).
        #[arg(long)]
        no_safety_check: bool,
        /// Override `RunConfig::conditions` from a YAML file.
        #[arg(long)]
        conditions: Option<PathBuf>,
        /// Pins the run clock to midnight UTC on this date instead of now.
        #[arg(long, value_name = "YYYYMMDD")]
        curr_date: Option<String>,
    },

    /// Derives per-operator lists and their deltas against a base run (C8).
    Listgen {
        /// Directory to write per-operator CSVs and the run manifest into.
        output_dir: PathBuf,
        /// Run id to diff against; omit to emit full lists only.
        #[arg(long)]
        base: Option<i64>,
        /// Suppress writing the full (non-delta) list CSVs.
        #[arg(long)]
        no_full_lists: bool,
        /// Skip dropping superseded per-operator output rows after the run.
        #[arg(long)]
        no_cleanup: bool,
        /// Bypass the sanity-variance check (spec.md §4.8, scenario 6).
        #[arg(long)]
        disable_sanity_checks: bool,
        #[arg(long)]
        conditions: Option<PathBuf>,
        #[arg(long, value_name = "YYYYMMDD")]
        curr_date: Option<String>,
    },

    /// Schema installation, upgrade, and repartitioning.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Deletes historic rows closed before the configured retention window.
    Prune,

    /// Lists observed input files from the data catalog.
    Catalog,

    /// Reports recent job runs.
    Report {
        /// Restrict to one top-level command name.
        #[arg(long)]
        command: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Whitelist-distribution side channel (spec.md §4.6 "side effect hooks").
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbAction {
    /// Reports whether the installed schema matches the latest version.
    Check,
    /// Applies every migrator newer than the installed version.
    Upgrade,
    /// Fresh install; identical to `upgrade` against an empty database.
    Install,
    /// Repartitions a sharded base table into `num_physical_shards` children.
    Repartition {
        #[arg(long)]
        base_table: String,
        #[arg(long)]
        num_physical_shards: u8,
    },
}

#[derive(Subcommand, Debug)]
pub enum WhitelistAction {
    /// Reserved for future whitelist-specific processing; currently a no-op
    /// placeholder matching spec.md §6's subcommand list.
    Process,
    /// Drains buffered `historic_whitelist_changes` notifications and logs
    /// what would be forwarded to the Kafka distributor.
    Distribute {
        #[arg(long, default_value_t = 5)]
        window_seconds: u64,
    },
}
