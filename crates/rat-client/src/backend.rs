//! Typed client for the backend REST API.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/api/v1/rats` | Create a record |
//! | PUT    | `/api/v1/rats/{id}` | Create or replace a record by id |
//! | GET    | `/api/v1/rats` | List the tenant's records |
//! | GET    | `/health` | Reachability probe |
//!
//! Requests carry `Authorization: Bearer {token}` and `X-Tenant-Id`. The
//! backend speaks camelCase JSON, the same shape as [`Record`].

use rat_core::{Record, TenantContext};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use url::Url;

use crate::config::{BackendConfig, ConfigError};
use crate::error::ClientError;
use crate::http;

const API_PREFIX: &str = "api/v1/rats";
const API_SEGMENTS: [&str; 3] = ["api", "v1", "rats"];
const TENANT_HEADER: &str = "x-tenant-id";

/// Some backend versions wrap payloads in `{ "data": ... }`; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(t) => t,
        }
    }
}

/// Client for the backend API.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub(crate) fn new(http: reqwest::Client, config: BackendConfig) -> Self {
        Self {
            http,
            base_url: config.url,
        }
    }

    /// `{base}/{segments...}`, each segment percent-encoded on its own so an
    /// opaque record id can never add path segments, a query or a fragment.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Config(ConfigError::InvalidUrl(
                    "RAT_BACKEND_URL".into(),
                    self.base_url.to_string(),
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn tenant_scoped(
        &self,
        request: reqwest::RequestBuilder,
        ctx: &TenantContext,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let auth = HeaderValue::from_str(&format!("Bearer {}", ctx.token()))
            .map_err(|_| ClientError::Config(ConfigError::InvalidHeader))?;
        let tenant = HeaderValue::from_str(ctx.tenant_id.as_str())
            .map_err(|_| ClientError::Config(ConfigError::InvalidHeader))?;
        Ok(request.header(AUTHORIZATION, auth).header(TENANT_HEADER, tenant))
    }

    /// Store a record and return the backend's representation.
    ///
    /// Records with an id go through `PUT /api/v1/rats/{id}` so a repeated
    /// save replaces rather than duplicates.
    pub async fn save(&self, record: &Record, ctx: &TenantContext) -> Result<Record, ClientError> {
        let (endpoint, request) = match &record.id {
            Some(id) => {
                let segments = API_SEGMENTS.into_iter().chain([id.as_str()]);
                (
                    format!("PUT /{API_PREFIX}/{id}"),
                    self.http.put(self.url(segments)?),
                )
            }
            None => (
                format!("POST /{API_PREFIX}"),
                self.http.post(self.url(API_SEGMENTS)?),
            ),
        };
        let request = self.tenant_scoped(request, ctx)?.json(record);

        let resp = http::send(request, &endpoint).await?;
        let stored: Envelope<Record> = http::decode(resp, &endpoint).await?;
        Ok(stored.into_inner())
    }

    /// List the tenant's records.
    pub async fn list(&self, ctx: &TenantContext) -> Result<Vec<Record>, ClientError> {
        let endpoint = format!("GET /{API_PREFIX}");
        let request = self.tenant_scoped(self.http.get(self.url(API_SEGMENTS)?), ctx)?;

        let resp = http::send(request, &endpoint).await?;
        let records: Envelope<Vec<Record>> = http::decode(resp, &endpoint).await?;
        Ok(records.into_inner())
    }

    /// Whether `/health` answers with a non-5xx status.
    pub async fn probe(&self) -> bool {
        let Ok(url) = self.url(["health"]) else {
            return false;
        };
        match self.http.get(url).send().await {
            Ok(resp) => !resp.status().is_server_error(),
            Err(e) => {
                tracing::debug!(error = %e, "backend probe failed");
                false
            }
        }
    }
}
