//! Error taxonomy for the persistence chain.
//!
//! Tier failures ([`StrategyError`]) never reach the caller of
//! [`FallbackChain::save`](crate::FallbackChain::save) as an `Err`; they are
//! reported inside the outcome. [`SaveError`] covers the two conditions the
//! chain cannot absorb.

use std::path::PathBuf;

use rat_client::ClientError;
use rat_core::{StrategyKind, TenantId};
use serde::Serialize;

/// Why one tier did not accept a write or answer a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum StrategyError {
    /// Network, DNS, timeout, 5xx, or the tier is not reachable at all.
    #[error("{strategy} unavailable: {reason}")]
    RemoteUnavailable {
        strategy: StrategyKind,
        reason: String,
    },
    /// The store answered and refused the payload.
    #[error("{strategy} rejected the request: {reason}")]
    RemoteRejected {
        strategy: StrategyKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        reason: String,
    },
    /// The access token was refused. The user has to sign in again.
    #[error("{strategy} refused the access token")]
    AuthExpired { strategy: StrategyKind },
}

impl StrategyError {
    /// Map a client error into the chain's taxonomy.
    pub fn classify(strategy: StrategyKind, err: &ClientError) -> Self {
        if err.is_auth_expired() {
            Self::AuthExpired { strategy }
        } else if err.is_transient() {
            Self::RemoteUnavailable {
                strategy,
                reason: err.to_string(),
            }
        } else {
            Self::RemoteRejected {
                strategy,
                status: err.status(),
                reason: err.to_string(),
            }
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        match self {
            Self::RemoteUnavailable { strategy, .. }
            | Self::RemoteRejected { strategy, .. }
            | Self::AuthExpired { strategy } => *strategy,
        }
    }

    /// Only unavailability is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}

/// Local storage failures.
#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("local store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("local store entry {path} is not valid: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    /// The blocking task running the store operation panicked or was
    /// cancelled.
    #[error("local store task failed: {0}")]
    Task(String),
}

/// Conditions under which `save` returns an error instead of an outcome.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The record's tenant differs from the caller's context. Raised before
    /// any store is contacted.
    #[error("record belongs to tenant {record} but the caller is scoped to {context}")]
    TenantMismatch { record: TenantId, context: TenantId },
    /// The terminal local write failed (disk full, permissions).
    #[error("local fallback write failed: {0}")]
    LocalStore(#[from] LocalStoreError),
}
