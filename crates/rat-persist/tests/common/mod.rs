//! Scripted tiers and a recording audit sink shared by the chain tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rat_core::{AuditEntry, Record, RecordId, StrategyKind, TenantContext, TenantId};
use rat_persist::{
    AuditError, AuditSink, FallbackChain, LocalStore, PersistStrategy, RetryPolicy, StrategyError,
};

/// How a scripted tier answers writes and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Accept,
    Unavailable,
    AuthExpired,
    Reject,
}

pub struct ScriptedStrategy {
    kind: StrategyKind,
    mode: Mutex<Mode>,
    reachable: AtomicBool,
    calls: AtomicU32,
    write_delay: Mutex<Duration>,
    stored: Mutex<Vec<Record>>,
}

impl ScriptedStrategy {
    pub fn new(kind: StrategyKind, mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            kind,
            mode: Mutex::new(mode),
            reachable: AtomicBool::new(mode != Mode::Unavailable),
            calls: AtomicU32::new(0),
            write_delay: Mutex::new(Duration::ZERO),
            stored: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
        self.reachable.store(mode != Mode::Unavailable, Ordering::SeqCst);
    }

    /// Accepted writes take this long to answer.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<Record> {
        self.stored.lock().clone()
    }

    pub fn seed(&self, record: Record) {
        self.stored.lock().push(record);
    }

    fn fail(&self, mode: Mode) -> StrategyError {
        match mode {
            Mode::Unavailable => StrategyError::RemoteUnavailable {
                strategy: self.kind,
                reason: "connection refused".into(),
            },
            Mode::AuthExpired => StrategyError::AuthExpired {
                strategy: self.kind,
            },
            _ => StrategyError::RemoteRejected {
                strategy: self.kind,
                status: Some(422),
                reason: "invalid payload".into(),
            },
        }
    }
}

#[async_trait]
impl PersistStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn write(&self, record: &Record, _ctx: &TenantContext) -> Result<Record, StrategyError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mode = *self.mode.lock();
        if mode != Mode::Accept {
            return Err(self.fail(mode));
        }
        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut stored = record.clone();
        if stored.id.is_none() {
            stored.id = Some(RecordId::new(format!("{}-{n}", self.kind)).unwrap());
        }
        let mut all = self.stored.lock();
        all.retain(|r| r.id != stored.id);
        all.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, ctx: &TenantContext) -> Result<Vec<Record>, StrategyError> {
        let mode = *self.mode.lock();
        if mode != Mode::Accept {
            return Err(self.fail(mode));
        }
        Ok(self
            .stored
            .lock()
            .iter()
            .filter(|r| r.tenant_id == ctx.tenant_id)
            .cloned()
            .collect())
    }

    async fn probe(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn append(&self, entry: &AuditEntry, _ctx: &TenantContext) -> Result<(), AuditError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

pub struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn append(&self, _: &AuditEntry, _: &TenantContext) -> Result<(), AuditError> {
        Err(AuditError("audit_log does not exist".into()))
    }
}

pub fn acme() -> TenantId {
    TenantId::new("acme").unwrap()
}

pub fn ctx() -> TenantContext {
    TenantContext::new(acme(), "user-jwt").with_user("u-42")
}

pub fn quick_retry() -> RetryPolicy {
    RetryPolicy::fixed(2, Duration::from_millis(1))
}

pub struct Harness {
    pub chain: FallbackChain,
    pub remote: Arc<ScriptedStrategy>,
    pub backend: Arc<ScriptedStrategy>,
    pub audit: Arc<RecordingSink>,
    pub dir: tempfile::TempDir,
}

pub fn harness(remote: Mode, backend: Mode) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let remote = ScriptedStrategy::new(StrategyKind::Remote, remote);
    let backend = ScriptedStrategy::new(StrategyKind::Backend, backend);
    let audit = Arc::new(RecordingSink::default());
    let chain = FallbackChain::new(Arc::new(LocalStore::new(dir.path())))
        .with_tier(remote.clone(), quick_retry())
        .with_tier(backend.clone(), quick_retry())
        .with_audit_sink(audit.clone());
    Harness {
        chain,
        remote,
        backend,
        audit,
        dir,
    }
}
