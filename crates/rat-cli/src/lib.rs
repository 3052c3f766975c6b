//! # rat-cli — Operator CLI for the RAT persistence chain
//!
//! ## Subcommands
//!
//! - `rat save --tenant T --file record.json` — run one record through the chain.
//! - `rat load --tenant T` — list the tenant's records from the best tier.
//! - `rat sync --tenant T` — replay pending local entries once.
//! - `rat pending --tenant T` — show entries still held locally.
//! - `rat purge --tenant T` — delete entries a remote store has confirmed.
//! - `rat watch --tenant T` — keep syncing whenever the primary store comes back.
//!
//! Configuration comes from `--config FILE` (sections `remote:` and
//! `persist:`) with `RAT_*` environment variables taking precedence.

pub mod records;
pub mod sync;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use rat_client::{RatClient, RatClientConfig, RawClientConfig};
use rat_core::{TenantContext, TenantId};
use rat_persist::{FallbackChain, PersistConfig, RawPersistConfig};
use serde::Serialize;

/// Environment variable holding the caller's bearer token.
pub const TOKEN_VAR: &str = "RAT_ACCESS_TOKEN";

/// Tenant selection shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct TenantArgs {
    /// Tenant (organization) the records belong to.
    #[arg(long)]
    pub tenant: String,

    /// User id recorded in audit entries.
    #[arg(long)]
    pub user: Option<String>,
}

impl TenantArgs {
    /// Build the explicit context passed to the chain. `token` falls back to
    /// `RAT_ACCESS_TOKEN`.
    pub fn context(&self, token: Option<&str>) -> Result<TenantContext> {
        let tenant = TenantId::new(self.tenant.as_str()).context("invalid --tenant")?;
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var(TOKEN_VAR).unwrap_or_default(),
        };
        if token.is_empty() {
            tracing::warn!("no access token; remote stores will see the anon key only");
        }
        let ctx = TenantContext::new(tenant, token);
        Ok(match &self.user {
            Some(user) => ctx.with_user(user.as_str()),
            None => ctx,
        })
    }
}

/// Everything a subcommand needs: the chain and the resolved settings.
#[derive(Debug, Clone)]
pub struct Session {
    pub chain: FallbackChain,
    pub persist: PersistConfig,
}

impl Session {
    /// Resolve configuration and build the chain.
    pub fn open(config: Option<&Path>) -> Result<Self> {
        let (remote_file, persist_file) = match config {
            Some(path) => (
                RawClientConfig::from_yaml_file(path)?,
                RawPersistConfig::from_yaml_file(path)?,
            ),
            None => (RawClientConfig::default(), RawPersistConfig::default()),
        };
        let lookup = |k: &str| std::env::var(k).ok();
        let remote = RatClientConfig::resolve(remote_file, lookup)?;
        let persist = PersistConfig::resolve(persist_file, lookup)?;

        if remote.supabase.is_none() && remote.backend.is_none() {
            tracing::warn!("no remote store configured; records will only be saved locally");
        }
        let client = RatClient::new(remote).context("failed to build HTTP clients")?;
        let chain = FallbackChain::from_clients(&client, &persist);
        tracing::debug!(?chain, "persistence chain ready");
        Ok(Self { chain, persist })
    }
}

/// Write `value` to stdout as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{text}");
    Ok(())
}
