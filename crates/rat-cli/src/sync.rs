//! # Local Storage Subcommands
//!
//! - `rat sync --tenant T` — one replay pass; exit code 2 if the token expired.
//! - `rat pending --tenant T` — list entries awaiting a remote store.
//! - `rat purge --tenant T` — delete entries a remote store has confirmed.
//! - `rat watch --tenant T [--interval S]` — run the connectivity monitor
//!   until Ctrl-C.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use rat_core::TenantId;
use rat_persist::{ConnectivityMonitor, SyncWorker};
use serde_json::json;
use tokio::sync::watch;

use crate::{print_json, Session, TenantArgs};

/// Exit code when the primary store refused the access token.
pub const EXIT_REAUTH: u8 = 2;

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub tenant: TenantArgs,
}

#[derive(Args, Debug)]
pub struct PendingArgs {
    #[command(flatten)]
    pub tenant: TenantArgs,
}

#[derive(Args, Debug)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub tenant: TenantArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub tenant: TenantArgs,

    /// Seconds between probes. Defaults to `RAT_SYNC_INTERVAL_SECS`.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

fn worker(session: &Session) -> Result<SyncWorker> {
    SyncWorker::from_chain(&session.chain)
        .context("no remote store configured; set RAT_SUPABASE_URL or RAT_BACKEND_URL")
}

fn tenant(args: &TenantArgs) -> Result<TenantId> {
    TenantId::new(args.tenant.as_str()).context("invalid --tenant")
}

pub async fn run_sync(args: &SyncArgs, session: &Session, token: Option<&str>) -> Result<u8> {
    let ctx = args.tenant.context(token)?;
    let report = worker(session)?
        .sync_pending(&ctx)
        .await
        .context("sync pass failed")?;
    print_json(&report)?;
    if report.auth_expired {
        tracing::warn!("access token was refused; sign in again and rerun `rat sync`");
        return Ok(EXIT_REAUTH);
    }
    Ok(0)
}

pub fn run_pending(args: &PendingArgs, session: &Session) -> Result<u8> {
    let pending = session.chain.local().list_pending(&tenant(&args.tenant)?)?;
    print_json(&pending)?;
    Ok(0)
}

pub fn run_purge(args: &PurgeArgs, session: &Session) -> Result<u8> {
    let tenant = tenant(&args.tenant)?;
    let removed = session.chain.local().purge_synced(&tenant)?;
    print_json(&json!({ "tenantId": tenant, "removed": removed }))?;
    Ok(0)
}

pub async fn run_watch(args: &WatchArgs, session: &Session, token: Option<&str>) -> Result<u8> {
    let ctx = args.tenant.context(token)?;
    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or(session.persist.sync_interval);
    let monitor = ConnectivityMonitor::new(worker(session)?, interval);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(ctx, rx));
    tracing::info!(?interval, "watching for connectivity; Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    let _ = tx.send(true);
    handle.await.context("monitor task panicked")?;
    Ok(0)
}
