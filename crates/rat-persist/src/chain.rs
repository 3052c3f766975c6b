//! # Fallback chain
//!
//! Writes go to the first tier that accepts them: Supabase, then the backend
//! API, then local storage. A tier that fails (after its retries) is recorded
//! in the outcome and the next one is tried; local storage is terminal, so
//! `save` only returns `Err` when the record is addressed to the wrong
//! tenant or the local write itself fails.
//!
//! Reads follow the same order. Entries still pending in local storage are
//! laid over whatever the answering tier returned, so a user never loses
//! sight of an offline edit.

use std::sync::Arc;
use std::time::Duration;

use rat_client::RatClient;
use rat_core::{
    AuditAction, PendingLocalRecord, Record, StrategyKind, TenantContext, Timestamp,
};
use serde::Serialize;

use crate::audit::{self, AuditSink, SupabaseAuditSink, TracingAuditSink};
use crate::config::PersistConfig;
use crate::error::{LocalStoreError, SaveError, StrategyError};
use crate::local::{self, LocalStore};
use crate::retry::RetryPolicy;
use crate::strategy::{BackendStrategy, PersistStrategy, SupabaseStrategy};

/// Upper bound on one audit append.
pub const DEFAULT_AUDIT_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// The record as the accepting tier holds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Remote(Record),
    Local(PendingLocalRecord),
}

impl StoredRecord {
    pub fn record(&self) -> &Record {
        match self {
            Self::Remote(r) => r,
            Self::Local(p) => &p.record,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Local(p) if p.sync_pending)
    }
}

/// Result of a save that some tier accepted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub strategy_used: StrategyKind,
    pub stored_record: StoredRecord,
    /// Tiers tried before the accepting one, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StrategyError>,
}

impl SaveOutcome {
    /// A remote tier refused the access token. The record is safe, but the
    /// user must sign in again before it can reach a remote store.
    pub fn requires_reauth(&self) -> bool {
        self.failures.iter().any(StrategyError::is_auth_expired)
    }

    /// Short user-facing status line.
    pub fn status_message(&self) -> &'static str {
        match self.strategy_used {
            StrategyKind::Remote => "Saved.",
            StrategyKind::Backend => "Saved through the backend service.",
            StrategyKind::Local if self.requires_reauth() => {
                "Saved on this device. Sign in again to sync it."
            }
            StrategyKind::Local => {
                "Saved on this device. It will sync when the connection is restored."
            }
        }
    }
}

/// Result of a load.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOutcome {
    /// Tier whose listing formed the base of `records`.
    pub source: StrategyKind,
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StrategyError>,
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// One remote tier with its retry policy.
#[derive(Clone)]
pub struct Tier {
    pub strategy: Arc<dyn PersistStrategy>,
    pub retry: RetryPolicy,
}

impl Tier {
    pub fn new(strategy: Arc<dyn PersistStrategy>, retry: RetryPolicy) -> Self {
        Self { strategy, retry }
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Write under this tier's retry policy. A representation scoped to a
    /// different tenant counts as a rejection.
    pub(crate) async fn write(
        &self,
        record: &Record,
        ctx: &TenantContext,
    ) -> Result<Record, StrategyError> {
        let kind = self.kind();
        let stored = self
            .retry
            .run(kind, || self.strategy.write(record, ctx))
            .await?;
        if stored.tenant_id != ctx.tenant_id {
            return Err(StrategyError::RemoteRejected {
                strategy: kind,
                status: None,
                reason: format!("store returned a record for tenant {}", stored.tenant_id),
            });
        }
        Ok(stored)
    }
}

impl std::fmt::Debug for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tier")
            .field("kind", &self.kind())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Ordered remote tiers backed by local storage.
#[derive(Clone)]
pub struct FallbackChain {
    tiers: Vec<Tier>,
    local: Arc<LocalStore>,
    audit: Arc<dyn AuditSink>,
    audit_timeout: Duration,
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("tiers", &self.tiers)
            .field("local", &self.local.base_dir())
            .finish()
    }
}

impl FallbackChain {
    /// A chain with no remote tiers: every save goes to `local`.
    pub fn new(local: Arc<LocalStore>) -> Self {
        Self {
            tiers: Vec::new(),
            local,
            audit: Arc::new(TracingAuditSink),
            audit_timeout: DEFAULT_AUDIT_TIMEOUT,
        }
    }

    /// Append a remote tier after those already present.
    pub fn with_tier(mut self, strategy: Arc<dyn PersistStrategy>, retry: RetryPolicy) -> Self {
        self.tiers.push(Tier::new(strategy, retry));
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn with_audit_timeout(mut self, timeout: Duration) -> Self {
        self.audit_timeout = timeout;
        self
    }

    /// The standard chain: Supabase (if configured), the backend API (if
    /// configured), then local storage. Audit entries go to Supabase when it
    /// is configured and to the `rat_audit` log target otherwise.
    pub fn from_clients(client: &RatClient, config: &PersistConfig) -> Self {
        let retry = config.retry_policy();
        let mut chain = Self::new(Arc::new(LocalStore::new(config.local_dir.clone())));
        if let Some(supabase) = client.supabase() {
            chain = chain
                .with_tier(Arc::new(SupabaseStrategy::new(supabase.clone())), retry)
                .with_audit_sink(Arc::new(SupabaseAuditSink::new(supabase.clone())));
        }
        if let Some(backend) = client.backend() {
            chain = chain.with_tier(Arc::new(BackendStrategy::new(backend.clone())), retry);
        }
        chain
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// The first remote tier, which sync replays into.
    pub fn primary(&self) -> Option<&Tier> {
        self.tiers.first()
    }

    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    pub(crate) fn audit_sink(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    pub(crate) fn audit_timeout(&self) -> Duration {
        self.audit_timeout
    }

    /// Persist `record` on behalf of `ctx`.
    pub async fn save(
        &self,
        mut record: Record,
        ctx: &TenantContext,
    ) -> Result<SaveOutcome, SaveError> {
        if record.tenant_id != ctx.tenant_id {
            return Err(SaveError::TenantMismatch {
                record: record.tenant_id,
                context: ctx.tenant_id.clone(),
            });
        }

        let action = if record.id.is_some() {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        record.touch(Timestamp::now());

        let mut failures = Vec::new();
        for tier in &self.tiers {
            let kind = tier.kind();
            match tier.write(&record, ctx).await {
                Ok(stored) => {
                    tracing::info!(
                        tenant = %ctx.tenant_id,
                        strategy = %kind,
                        id = stored.id.as_ref().map(|id| id.as_str()).unwrap_or(""),
                        fallbacks = failures.len(),
                        "record persisted"
                    );
                    self.settle_local_copy(&stored, ctx).await;
                    self.audit(action, stored.resource_id_or(""), kind, ctx)
                        .await;
                    return Ok(SaveOutcome {
                        strategy_used: kind,
                        stored_record: StoredRecord::Remote(stored),
                        failures,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        tenant = %ctx.tenant_id,
                        strategy = %kind,
                        error = %e,
                        "tier failed, falling through"
                    );
                    failures.push(e);
                }
            }
        }

        let saved_at = Timestamp::now();
        let key = local::key_for(&record, saved_at);
        let entry = PendingLocalRecord::pending(record, key, saved_at);
        let to_write = entry.clone();
        local::run_blocking(&self.local, move |store| store.put(&to_write)).await?;
        tracing::warn!(
            tenant = %ctx.tenant_id,
            local_key = %entry.local_key,
            reauth = failures.iter().any(StrategyError::is_auth_expired),
            "remote tiers unavailable, record saved locally pending sync"
        );
        self.audit(
            action,
            entry.record.resource_id_or(&entry.local_key),
            StrategyKind::Local,
            ctx,
        )
        .await;

        Ok(SaveOutcome {
            strategy_used: StrategyKind::Local,
            stored_record: StoredRecord::Local(entry),
            failures,
        })
    }

    /// A remote store accepted a record that also waits in local storage
    /// under its id; the local copy is no longer pending.
    async fn settle_local_copy(&self, stored: &Record, ctx: &TenantContext) {
        let Some(id) = stored.id.clone() else { return };
        let tenant = ctx.tenant_id.clone();
        let stored = stored.clone();
        let key = id.clone();
        let settled = local::run_blocking(&self.local, move |store| {
            match store.get(&tenant, key.as_str())? {
                Some(entry) if entry.sync_pending => store.mark_synced(&entry, stored),
                _ => Ok(None),
            }
        })
        .await;
        if let Err(e) = settled {
            tracing::warn!(error = %e, id = %id, "could not settle local copy");
        }
    }

    async fn audit(
        &self,
        action: AuditAction,
        resource_id: &str,
        strategy: StrategyKind,
        ctx: &TenantContext,
    ) {
        let entry = audit::entry_for(action, resource_id, strategy, ctx);
        audit::record_best_effort(self.audit.as_ref(), &entry, ctx, self.audit_timeout).await;
    }

    /// The tenant's records from the first tier that answers, with pending
    /// local entries laid over them. Does not trigger a sync.
    pub async fn load(&self, ctx: &TenantContext) -> Result<LoadOutcome, LocalStoreError> {
        let tenant = ctx.tenant_id.clone();
        let local_entries =
            local::run_blocking(&self.local, move |store| store.list(&tenant)).await?;

        let mut failures = Vec::new();
        for tier in &self.tiers {
            let kind = tier.kind();
            match tier.retry.run(kind, || tier.strategy.list(ctx)).await {
                Ok(records) => {
                    let records = records
                        .into_iter()
                        .filter(|r| r.tenant_id == ctx.tenant_id)
                        .collect();
                    return Ok(LoadOutcome {
                        source: kind,
                        records: overlay_pending(records, &local_entries),
                        failures,
                    });
                }
                Err(e) => {
                    tracing::warn!(strategy = %kind, error = %e, "listing failed, falling through");
                    failures.push(e);
                }
            }
        }

        Ok(LoadOutcome {
            source: StrategyKind::Local,
            records: local_entries.into_iter().map(|e| e.record).collect(),
            failures,
        })
    }
}

/// Replace remote records that have a pending local edit and append pending
/// entries the remote store has never seen.
fn overlay_pending(mut records: Vec<Record>, local: &[PendingLocalRecord]) -> Vec<Record> {
    for entry in local.iter().filter(|e| e.sync_pending) {
        let slot = entry
            .record
            .id
            .as_ref()
            .and_then(|id| records.iter_mut().find(|r| r.id.as_ref() == Some(id)));
        match slot {
            Some(slot) => *slot = entry.record.clone(),
            None => records.push(entry.record.clone()),
        }
    }
    records
}
