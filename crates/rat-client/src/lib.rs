//! # rat-client — Typed clients for the RAT registry's remote stores
//!
//! Two remote stores accept processing-activity records:
//! - **Supabase** — the hosted Postgres behind PostgREST (`/rest/v1`), the
//!   primary store.
//! - **Backend API** — the application's own REST service (`/api/v1/rats`),
//!   the secondary store.
//!
//! ## Architecture
//!
//! This crate only speaks HTTP. It classifies failures
//! ([`ClientError::is_transient`], [`ClientError::is_auth_expired`]) but
//! never retries or falls back; `rat-persist` owns that policy.
//!
//! Both clients share one `reqwest::Client` with the configured timeout.
//! Credentials are per call: the tenant and bearer token arrive in a
//! [`rat_core::TenantContext`].

pub mod backend;
pub mod config;
pub mod error;
pub(crate) mod http;
pub mod supabase;

pub use backend::BackendClient;
pub use config::{BackendConfig, ConfigError, RatClientConfig, RawClientConfig, SupabaseConfig};
pub use error::ClientError;
pub use supabase::{RatRow, SupabaseClient};

use std::time::Duration;

/// Remote clients built from one configuration. Tiers left unconfigured
/// are `None`.
#[derive(Debug, Clone)]
pub struct RatClient {
    supabase: Option<SupabaseClient>,
    backend: Option<BackendClient>,
}

impl RatClient {
    /// Build the HTTP clients described by `config`.
    pub fn new(config: RatClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            supabase: config
                .supabase
                .map(|c| SupabaseClient::new(http.clone(), c)),
            backend: config.backend.map(|c| BackendClient::new(http, c)),
        })
    }

    /// The Supabase client, if configured.
    pub fn supabase(&self) -> Option<&SupabaseClient> {
        self.supabase.as_ref()
    }

    /// The backend API client, if configured.
    pub fn backend(&self) -> Option<&BackendClient> {
        self.backend.as_ref()
    }
}
