//! The seam between the chain and a concrete remote store.
//!
//! [`PersistStrategy`] is implemented once per tier. The chain never talks
//! HTTP itself; it calls `write`/`list` under a [`RetryPolicy`](crate::RetryPolicy)
//! and falls through on `Err`.

use async_trait::async_trait;
use rat_client::{BackendClient, SupabaseClient};
use rat_core::{Record, StrategyKind, TenantContext};

use crate::error::StrategyError;

/// A remote store that can accept and list records.
#[async_trait]
pub trait PersistStrategy: Send + Sync {
    /// Tier identity, reported as `strategyUsed` and in audit entries.
    fn kind(&self) -> StrategyKind;

    /// Store `record` and return the store's representation of it.
    async fn write(&self, record: &Record, ctx: &TenantContext) -> Result<Record, StrategyError>;

    /// All of the tenant's records held by this store.
    async fn list(&self, ctx: &TenantContext) -> Result<Vec<Record>, StrategyError>;

    /// Cheap reachability check. Does not authenticate.
    async fn probe(&self) -> bool;
}

/// Supabase (PostgREST) tier.
#[derive(Debug, Clone)]
pub struct SupabaseStrategy {
    client: SupabaseClient,
}

impl SupabaseStrategy {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }
}

#[async_trait]
impl PersistStrategy for SupabaseStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Remote
    }

    async fn write(&self, record: &Record, ctx: &TenantContext) -> Result<Record, StrategyError> {
        self.client
            .upsert(record, ctx)
            .await
            .map_err(|e| StrategyError::classify(self.kind(), &e))
    }

    async fn list(&self, ctx: &TenantContext) -> Result<Vec<Record>, StrategyError> {
        self.client
            .list(ctx)
            .await
            .map_err(|e| StrategyError::classify(self.kind(), &e))
    }

    async fn probe(&self) -> bool {
        self.client.probe().await
    }
}

/// Backend API tier.
#[derive(Debug, Clone)]
pub struct BackendStrategy {
    client: BackendClient,
}

impl BackendStrategy {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PersistStrategy for BackendStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Backend
    }

    async fn write(&self, record: &Record, ctx: &TenantContext) -> Result<Record, StrategyError> {
        self.client
            .save(record, ctx)
            .await
            .map_err(|e| StrategyError::classify(self.kind(), &e))
    }

    async fn list(&self, ctx: &TenantContext) -> Result<Vec<Record>, StrategyError> {
        self.client
            .list(ctx)
            .await
            .map_err(|e| StrategyError::classify(self.kind(), &e))
    }

    async fn probe(&self) -> bool {
        self.client.probe().await
    }
}
