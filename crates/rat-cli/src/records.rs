//! # Record Subcommands
//!
//! - `rat save --tenant T --file F` — persist one record through the chain.
//! - `rat load --tenant T` — list records from the first tier that answers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use rat_core::Record;
use serde_json::Value;

use crate::{print_json, Session, TenantArgs};

/// Arguments for `rat save`.
#[derive(Args, Debug)]
pub struct SaveArgs {
    #[command(flatten)]
    pub tenant: TenantArgs,

    /// JSON file holding one record (camelCase fields). `tenantId` may be
    /// omitted; it is taken from `--tenant`.
    #[arg(long, short)]
    pub file: PathBuf,
}

/// Arguments for `rat load`.
#[derive(Args, Debug)]
pub struct LoadArgs {
    #[command(flatten)]
    pub tenant: TenantArgs,
}

/// Read a record file, filling in `tenantId` from `tenant` when absent.
pub fn read_record(path: &Path, tenant: &str) -> Result<Record> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let mut value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let obj = value
        .as_object_mut()
        .with_context(|| format!("{} must hold a JSON object", path.display()))?;
    obj.entry("tenantId")
        .or_insert_with(|| Value::String(tenant.to_string()));
    serde_json::from_value(value).with_context(|| format!("{} is not a valid record", path.display()))
}

pub async fn run_save(args: &SaveArgs, session: &Session, token: Option<&str>) -> Result<u8> {
    let ctx = args.tenant.context(token)?;
    let record = read_record(&args.file, &args.tenant.tenant)?;
    let outcome = session
        .chain
        .save(record, &ctx)
        .await
        .context("save failed")?;

    print_json(&outcome)?;
    if outcome.requires_reauth() {
        tracing::warn!("access token was refused; sign in again so local records can sync");
    }
    eprintln!("{}", outcome.status_message());
    Ok(0)
}

pub async fn run_load(args: &LoadArgs, session: &Session, token: Option<&str>) -> Result<u8> {
    let ctx = args.tenant.context(token)?;
    let outcome = session.chain.load(&ctx).await.context("load failed")?;
    print_json(&outcome)?;
    Ok(0)
}
