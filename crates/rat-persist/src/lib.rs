//! # rat-persist — Fallback persistence for RAT registry records
//!
//! Saving a processing-activity record must not fail because a network
//! store is down. [`FallbackChain::save`] tries each remote tier in order
//! (Supabase, then the backend API), each under its own [`RetryPolicy`],
//! and ends with [`LocalStore`], which always accepts the record unless the
//! disk itself fails.
//!
//! ## Crate Layout
//!
//! - [`strategy`]: the [`PersistStrategy`] trait and its two remote tiers.
//! - [`retry`]: attempt counting, backoff, per-attempt timeout.
//! - [`local`]: tenant-partitioned JSON files with atomic writes.
//! - [`chain`]: `save`/`load` across the tiers.
//! - [`sync`]: replay of pending local entries and the connectivity monitor.
//! - [`audit`]: best-effort audit sinks.
//! - [`config`]: directory, retry and interval settings.
//!
//! Every call takes a [`rat_core::TenantContext`]; nothing here reads
//! ambient session state.

pub mod audit;
pub mod chain;
pub mod config;
pub mod error;
pub mod local;
pub mod retry;
pub mod strategy;
pub mod sync;

pub use audit::{AuditError, AuditSink, SupabaseAuditSink, TracingAuditSink};
pub use chain::{FallbackChain, LoadOutcome, SaveOutcome, StoredRecord, Tier};
pub use config::{PersistConfig, RawPersistConfig};
pub use error::{LocalStoreError, SaveError, StrategyError};
pub use local::LocalStore;
pub use retry::{Backoff, RetryPolicy};
pub use strategy::{BackendStrategy, PersistStrategy, SupabaseStrategy};
pub use sync::{ConnectivityMonitor, LinkState, SyncReport, SyncWorker};
