//! Audit trail sinks.
//!
//! A successful save or replay appends one [`AuditEntry`]. Appends are best
//! effort: a failing sink is logged at debug level and never changes the
//! outcome of the write it describes.

use std::time::Duration;

use async_trait::async_trait;
use rat_client::SupabaseClient;
use rat_core::{AuditAction, AuditEntry, StrategyKind, TenantContext, Timestamp};

/// Log target used by [`TracingAuditSink`].
pub const AUDIT_TARGET: &str = "rat_audit";

#[derive(Debug, thiserror::Error)]
#[error("audit sink failed: {0}")]
pub struct AuditError(pub String);

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry, ctx: &TenantContext) -> Result<(), AuditError>;
}

/// Emits each entry as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, entry: &AuditEntry, _ctx: &TenantContext) -> Result<(), AuditError> {
        tracing::info!(
            target: AUDIT_TARGET,
            action = %entry.action,
            resource_id = %entry.resource_id,
            tenant = %entry.tenant_id,
            strategy = %entry.strategy,
            user_id = entry.user_id.as_deref().unwrap_or(""),
            timestamp = %entry.timestamp.to_rfc3339(),
            "audit"
        );
        Ok(())
    }
}

/// Inserts entries into the Supabase audit table.
#[derive(Debug, Clone)]
pub struct SupabaseAuditSink {
    client: SupabaseClient,
}

impl SupabaseAuditSink {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuditSink for SupabaseAuditSink {
    async fn append(&self, entry: &AuditEntry, ctx: &TenantContext) -> Result<(), AuditError> {
        self.client
            .insert_audit(entry, ctx)
            .await
            .map_err(|e| AuditError(e.to_string()))
    }
}

/// Build the entry for a write handled by `strategy`.
pub fn entry_for(
    action: AuditAction,
    resource_id: &str,
    strategy: StrategyKind,
    ctx: &TenantContext,
) -> AuditEntry {
    AuditEntry {
        action,
        resource_id: resource_id.to_string(),
        tenant_id: ctx.tenant_id.clone(),
        strategy,
        user_id: ctx.user_id.clone(),
        timestamp: Timestamp::now(),
    }
}

/// Append `entry`, bounded by `limit`, swallowing any failure.
pub(crate) async fn record_best_effort(
    sink: &dyn AuditSink,
    entry: &AuditEntry,
    ctx: &TenantContext,
    limit: Duration,
) {
    match tokio::time::timeout(limit, sink.append(entry, ctx)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(
            error = %e,
            action = %entry.action,
            resource_id = %entry.resource_id,
            "audit append failed"
        ),
        Err(_) => tracing::debug!(
            action = %entry.action,
            resource_id = %entry.resource_id,
            "audit append timed out after {limit:?}"
        ),
    }
}
