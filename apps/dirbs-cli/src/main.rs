//! DIRBS Core binary entry point: parses [`dirbs_cli::Cli`], assembles a
//! [`RunContext`] from layered configuration and CLI overrides, connects
//! to Postgres, and dispatches to the matching subcommand handler.

use chrono::NaiveDate;
use clap::Parser;
use dirbs_cli::cli::{Cli, Command, DbAction, WhitelistAction};
use dirbs_cli::commands;
use dirbs_cli::error::DirbsError;
use dirbs_infra_db::DbClient;
use dirbs_shared_runtime::{config, Clock, FixedClock, Metrics, RunContext, SystemClock};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "dirbs_cli=debug,sqlx=warn");
    }
    dirbs_shared_runtime::init_tracing("dirbs-cli");

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");

    match run(cli, &command_line).await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            tracing::error!(error = %err, "dirbs-cli failed");
            std::process::exit(err.exit_code());
        }
    }
}

async fn run(cli: Cli, command_line: &str) -> Result<(), DirbsError> {
    let mut run_config = config::load()?;
    apply_overrides(&mut run_config, &cli);

    let db = DbClient::connect(&run_config.db.connection_url(), run_config.db.max_connections).await?;

    let metrics = Metrics::new(&run_config.statsd, "dirbs")
        .map_err(|err| DirbsError::Internal(err.to_string()))?;

    let curr_date = match &cli.command {
        Command::Classify { curr_date, .. } | Command::Listgen { curr_date, .. } => {
            curr_date.as_deref()
        }
        _ => None,
    };
    let clock: Arc<dyn Clock> = match curr_date {
        Some(raw) => Arc::new(FixedClock::at_date(parse_curr_date(raw)?)),
        None => Arc::new(SystemClock),
    };

    let ctx = RunContext::new(run_config, metrics, 0, clock);

    match cli.command {
        Command::Import {
            list_type,
            file,
            delta,
            operator,
        } => {
            commands::import::run(&ctx, &db, &list_type, &file, delta, operator.as_deref(), command_line).await
        }
        Command::Classify {
            no_safety_check,
            conditions,
            curr_date: _,
        } => commands::classify::run(&ctx, &db, no_safety_check, conditions.as_deref(), command_line).await,
        Command::Listgen {
            output_dir,
            base,
            no_full_lists,
            no_cleanup,
            disable_sanity_checks,
            conditions,
            curr_date: _,
        } => {
            commands::listgen::run(
                &ctx,
                &db,
                &output_dir,
                base,
                no_full_lists,
                no_cleanup,
                disable_sanity_checks,
                conditions.as_deref(),
                command_line,
            )
            .await
        }
        Command::Db { action } => run_db(&db, &action).await,
        Command::Prune => commands::prune::run(&ctx, &db, command_line).await,
        Command::Catalog => commands::catalog::run(&db).await,
        Command::Report { command, limit } => {
            commands::report::run(&db, command.as_deref(), limit).await
        }
        Command::Whitelist { action } => run_whitelist(&ctx, &action).await,
    }
}

async fn run_db(db: &DbClient, action: &DbAction) -> Result<(), DirbsError> {
    commands::db::run(db, action).await
}

async fn run_whitelist(ctx: &RunContext, action: &WhitelistAction) -> Result<(), DirbsError> {
    commands::whitelist::run(&ctx.config.db.connection_url(), action).await
}

/// Layers CLI flags on top of the loaded [`dirbs_shared_runtime::RunConfig`].
/// Flags win because they're the most specific source a user can reach for
/// on a single invocation.
fn apply_overrides(run_config: &mut dirbs_shared_runtime::RunConfig, cli: &Cli) {
    if let Some(host) = &cli.db_host {
        run_config.db.host = host.clone();
    }
    if let Some(port) = cli.db_port {
        run_config.db.port = port;
    }
    if let Some(name) = &cli.db_name {
        run_config.db.database = name.clone();
    }
    if let Some(user) = &cli.db_user {
        run_config.db.user = user.clone();
    }
    if let Some(password) = &cli.db_password {
        run_config.db.password = password.clone();
    }
    if let Some(max_db_connections) = cli.max_db_connections {
        run_config.db.max_connections = max_db_connections;
    }
    if let Some(host) = &cli.statsd_host {
        run_config.statsd.host = Some(host.clone());
    }
    if let Some(port) = cli.statsd_port {
        run_config.statsd.port = port;
    }
    if let Some(max_local_cpus) = cli.max_local_cpus {
        run_config.multiprocessing.max_local_cpus = max_local_cpus;
    }
}

fn parse_curr_date(raw: &str) -> Result<NaiveDate, DirbsError> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .map_err(|_| DirbsError::Usage(format!("--curr-date expects YYYYMMDD, got {raw:?}")))
}
