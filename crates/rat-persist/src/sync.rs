//! Replay of locally stored records into the primary remote store.
//!
//! [`SyncWorker::sync_pending`] walks the tenant's pending entries oldest
//! first and writes each one to the primary tier. A confirmed entry is
//! marked synced and keeps its file until purged; a failed one stays pending
//! with its attempt count bumped. An entry rewritten by a local save while
//! its replay was in flight stays pending with the newer content. An expired
//! token stops the pass, since every remaining entry would be refused for
//! the same reason.
//!
//! [`ConnectivityMonitor`] runs passes in the background: it probes the
//! primary tier on an interval and syncs when the link comes back.

use std::sync::Arc;
use std::time::Duration;

use rat_core::{AuditAction, RecordId, StrategyKind, TenantContext};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::audit::{self, AuditSink};
use crate::chain::{FallbackChain, Tier};
use crate::error::LocalStoreError;
use crate::local::{self, LocalStore};

/// Default probe interval for [`ConnectivityMonitor`].
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// Shortest period [`ConnectivityMonitor::run`] will tick at.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedEntry {
    pub local_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEntry {
    pub local_key: String,
    pub error: String,
}

/// What one sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Pending entries found at the start of the pass.
    pub pending: usize,
    pub synced: Vec<SyncedEntry>,
    pub failed: Vec<FailedEntry>,
    /// Entries the remote accepted whose local copy was edited again during
    /// the replay; they stay pending with the newer content.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub superseded: Vec<String>,
    /// The pass stopped because the primary store refused the token.
    pub auth_expired: bool,
}

impl SyncReport {
    /// Entries left pending after the pass.
    pub fn remaining(&self) -> usize {
        self.pending - self.synced.len()
    }
}

/// Replays pending local entries into the primary tier.
#[derive(Clone)]
pub struct SyncWorker {
    primary: Tier,
    local: Arc<LocalStore>,
    audit: Arc<dyn AuditSink>,
    audit_timeout: Duration,
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("primary", &self.primary)
            .field("local", &self.local.base_dir())
            .finish()
    }
}

impl SyncWorker {
    /// Worker sharing `chain`'s primary tier, local store and audit sink.
    /// `None` when the chain has no remote tier.
    pub fn from_chain(chain: &FallbackChain) -> Option<Self> {
        Some(Self {
            primary: chain.primary()?.clone(),
            local: chain.local().clone(),
            audit: chain.audit_sink().clone(),
            audit_timeout: chain.audit_timeout(),
        })
    }

    pub fn primary_kind(&self) -> StrategyKind {
        self.primary.kind()
    }

    /// Whether the primary tier answers its probe.
    pub async fn probe(&self) -> bool {
        self.primary.strategy.probe().await
    }

    /// Replay every pending entry of `ctx`'s tenant.
    pub async fn sync_pending(&self, ctx: &TenantContext) -> Result<SyncReport, LocalStoreError> {
        let tenant = ctx.tenant_id.clone();
        let pending =
            local::run_blocking(&self.local, move |store| store.list_pending(&tenant)).await?;
        let kind = self.primary.kind();
        let mut report = SyncReport {
            pending: pending.len(),
            ..SyncReport::default()
        };

        for entry in pending {
            match self.primary.write(&entry.record, ctx).await {
                Ok(stored) => {
                    let remote_id = stored.id.clone();
                    let resource_id = stored.resource_id_or(&entry.local_key).to_string();
                    let audit_entry =
                        audit::entry_for(AuditAction::Sync, &resource_id, kind, ctx);
                    audit::record_best_effort(
                        self.audit.as_ref(),
                        &audit_entry,
                        ctx,
                        self.audit_timeout,
                    )
                    .await;

                    let replayed = entry.clone();
                    let marked = local::run_blocking(&self.local, move |store| {
                        store.mark_synced(&replayed, stored)
                    })
                    .await;
                    match marked {
                        Ok(Some(current)) if current.sync_pending => {
                            tracing::info!(
                                tenant = %ctx.tenant_id,
                                local_key = %entry.local_key,
                                "local entry changed during replay, newer content stays pending"
                            );
                            report.superseded.push(entry.local_key);
                        }
                        Ok(_) => report.synced.push(SyncedEntry {
                            local_key: entry.local_key,
                            remote_id,
                        }),
                        Err(e) => {
                            tracing::warn!(
                                tenant = %ctx.tenant_id,
                                local_key = %entry.local_key,
                                remote_id = remote_id.as_ref().map(|id| id.as_str()).unwrap_or(""),
                                error = %e,
                                "remote accepted the entry but it could not be marked synced"
                            );
                            report.failed.push(FailedEntry {
                                local_key: entry.local_key,
                                error: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) if e.is_auth_expired() => {
                    tracing::warn!(
                        tenant = %ctx.tenant_id,
                        strategy = %kind,
                        "access token refused, stopping sync pass"
                    );
                    report.auth_expired = true;
                    break;
                }
                Err(e) => {
                    let reason = e.to_string();
                    tracing::warn!(
                        tenant = %ctx.tenant_id,
                        local_key = %entry.local_key,
                        error = %reason,
                        "replay failed, entry stays pending"
                    );
                    let tenant = ctx.tenant_id.clone();
                    let key = entry.local_key.clone();
                    let why = reason.clone();
                    let counted = local::run_blocking(&self.local, move |store| {
                        store.record_sync_failure(&tenant, &key, &why)
                    })
                    .await;
                    if let Err(e) = counted {
                        tracing::warn!(local_key = %entry.local_key, error = %e, "could not count failed replay");
                    }
                    report.failed.push(FailedEntry {
                        local_key: entry.local_key,
                        error: reason,
                    });
                }
            }
        }

        if report.pending > 0 {
            tracing::info!(
                tenant = %ctx.tenant_id,
                pending = report.pending,
                synced = report.synced.len(),
                failed = report.failed.len(),
                superseded = report.superseded.len(),
                auth_expired = report.auth_expired,
                "sync pass finished"
            );
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Connectivity monitor
// ---------------------------------------------------------------------------

/// Last observed reachability of the primary tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Probes the primary tier on an interval and runs a sync pass whenever it
/// becomes reachable (including the first probe after start).
#[derive(Debug)]
pub struct ConnectivityMonitor {
    worker: SyncWorker,
    interval: Duration,
}

impl ConnectivityMonitor {
    pub fn new(worker: SyncWorker, interval: Duration) -> Self {
        Self { worker, interval }
    }

    /// One probe. Returns the report when the probe triggered a pass.
    pub async fn tick(
        &self,
        state: &mut LinkState,
        ctx: &TenantContext,
    ) -> Result<Option<SyncReport>, LocalStoreError> {
        let reachable = self.worker.probe().await;
        let previous = *state;
        *state = if reachable {
            LinkState::Online
        } else {
            LinkState::Offline
        };

        if previous != *state {
            tracing::info!(
                strategy = %self.worker.primary_kind(),
                from = ?previous,
                to = ?*state,
                "link state changed"
            );
        }
        if !reachable || previous == LinkState::Online {
            return Ok(None);
        }
        self.worker.sync_pending(ctx).await.map(Some)
    }

    /// Run until `shutdown` carries `true` or its sender is dropped.
    /// Intervals below [`MIN_SYNC_INTERVAL`] are raised to it.
    pub async fn run(self, ctx: TenantContext, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval.max(MIN_SYNC_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = LinkState::Unknown;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick(&mut state, &ctx).await {
                        Ok(Some(report)) if report.auth_expired => {
                            tracing::warn!(tenant = %ctx.tenant_id, "sync paused until the user signs in again");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "sync pass aborted"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!(tenant = %ctx.tenant_id, "connectivity monitor stopped");
                        break;
                    }
                }
            }
        }
    }
}
