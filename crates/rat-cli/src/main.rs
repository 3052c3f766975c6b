//! # rat CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rat_cli::records::{run_load, run_save, LoadArgs, SaveArgs};
use rat_cli::sync::{
    run_pending, run_purge, run_sync, run_watch, PendingArgs, PurgeArgs, SyncArgs, WatchArgs,
};
use rat_cli::Session;

/// RAT registry persistence CLI
///
/// Saves processing-activity records through the Supabase, backend API and
/// local storage chain, and replays locally held records once a remote
/// store is reachable again.
#[derive(Parser, Debug)]
#[command(name = "rat", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bearer token for the remote stores. Defaults to RAT_ACCESS_TOKEN.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Save one record through the fallback chain.
    Save(SaveArgs),

    /// List a tenant's records, overlaying pending local edits.
    Load(LoadArgs),

    /// Replay pending local records into the primary store once.
    Sync(SyncArgs),

    /// Show records held locally that no remote store has confirmed.
    Pending(PendingArgs),

    /// Delete local records a remote store has confirmed.
    Purge(PurgeArgs),

    /// Sync automatically whenever the primary store becomes reachable.
    Watch(WatchArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let session = match Session::open(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };
    let token = cli.token.as_deref();

    let result = match &cli.command {
        Commands::Save(args) => run_save(args, &session, token).await,
        Commands::Load(args) => run_load(args, &session, token).await,
        Commands::Sync(args) => run_sync(args, &session, token).await,
        Commands::Pending(args) => run_pending(args, &session),
        Commands::Purge(args) => run_purge(args, &session),
        Commands::Watch(args) => run_watch(args, &session, token).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
