//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Installs a tracing subscriber
//! - Handles argument parsing
//! - Formats output for human consumption
//!
//! ## Logging
//!
//! Logs go to stderr so they never mix with command output. The filter comes
//! from `HERDMEDS_LOG` (tracing `EnvFilter` syntax, default `warn`);
//! `--verbose` forces `debug`.

use super::handlers::{self, Context};
use super::setup::{Cli, Commands};
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "HERDMEDS_LOG";

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // Only fails if a subscriber is already set.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = Context {
        api: herdmedsapp::open(cli.data_dir.clone())?,
        json: cli.json,
        now: Utc::now(),
    };

    let launch = matches!(cli.command, Commands::Startup);
    dispatch(&ctx, cli.command)?;

    // `startup` already ran the backup check.
    if !launch {
        if let Err(e) = ctx.api.auto_backup_if_due() {
            warn!(error = %e, "automatic backup failed");
        }
    }
    Ok(())
}

fn dispatch(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Add(args) => handlers::add(ctx, args),
        Commands::List { favorites } => handlers::list(ctx, favorites),
        Commands::Show { id } => handlers::show(ctx, &id),
        Commands::Edit(args) => handlers::edit(ctx, args),
        Commands::Delete { id } => handlers::delete(ctx, &id),
        Commands::Fav { id } => handlers::fav(ctx, &id),
        Commands::Backup => handlers::backup(ctx),
        Commands::Restore { merge } => handlers::restore(ctx, merge),
        Commands::Export { dir, snapshot } => handlers::export(ctx, &dir, snapshot),
        Commands::Import { file, merge } => handlers::import(ctx, &file, merge),
        Commands::Stats => handlers::stats(ctx),
        Commands::Doctor => handlers::doctor(ctx),
        Commands::Startup => handlers::startup(ctx),
    }
}
