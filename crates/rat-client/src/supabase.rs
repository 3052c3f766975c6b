//! Typed client for the Supabase REST surface (PostgREST).
//!
//! ## Paths
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/rest/v1/{table}?on_conflict=id` | Upsert a record (id present) |
//! | POST   | `/rest/v1/{table}` | Insert a record (id assigned by the database) |
//! | GET    | `/rest/v1/{table}?tenant_id=eq.{tenant}` | List a tenant's records |
//! | POST   | `/rest/v1/{audit_table}` | Append an audit row |
//! | GET    | `/rest/v1/` | Reachability probe |
//!
//! Every request carries the project `apikey` and the caller's bearer
//! token, so row-level security sees the signed-in user. Columns are
//! snake_case; [`RatRow`] owns the mapping to and from [`Record`].

use rat_core::{
    AuditEntry, LegalBasis, Record, RecordId, RecordStatus, StrategyKind, TenantContext,
    TenantId, Timestamp,
};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::config::SupabaseConfig;
use crate::error::ClientError;
use crate::http;

const APIKEY: &str = "apikey";
const PREFER: &str = "prefer";

/// Row shape of the records table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub tenant_id: TenantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub legal_basis: Option<LegalBasis>,
    #[serde(default)]
    pub data_categories: Vec<String>,
    #[serde(default)]
    pub data_subjects: Vec<String>,
    #[serde(default)]
    pub retention_period: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
    /// jsonb column holding the untyped wizard answers.
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl From<&Record> for RatRow {
    fn from(r: &Record) -> Self {
        Self {
            id: r.id.clone(),
            tenant_id: r.tenant_id.clone(),
            created_at: r.created_at,
            updated_at: r.updated_at,
            activity_name: r.activity_name.clone(),
            purpose: r.purpose.clone(),
            legal_basis: r.legal_basis,
            data_categories: r.data_categories.clone(),
            data_subjects: r.data_subjects.clone(),
            retention_period: r.retention_period.clone(),
            status: r.status,
            details: r.details.clone(),
        }
    }
}

impl From<RatRow> for Record {
    fn from(row: RatRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            activity_name: row.activity_name,
            purpose: row.purpose,
            legal_basis: row.legal_basis,
            data_categories: row.data_categories,
            data_subjects: row.data_subjects,
            retention_period: row.retention_period,
            status: row.status,
            details: row.details,
        }
    }
}

/// Row shape of the audit table.
#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    action: &'a str,
    resource_id: &'a str,
    tenant_id: &'a str,
    strategy: StrategyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    created_at: Timestamp,
}

/// Client for the Supabase REST API.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: Zeroizing<String>,
    table: String,
    audit_table: String,
}

impl SupabaseClient {
    pub(crate) fn new(http: reqwest::Client, config: SupabaseConfig) -> Self {
        Self {
            http,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            anon_key: config.anon_key,
            table: config.table,
            audit_table: config.audit_table,
        }
    }

    fn rest_url(&self, relation: &str) -> String {
        format!("{}/rest/v1/{relation}", self.base_url)
    }

    /// Attach `apikey` and `Authorization`. Without a user token the anon
    /// key doubles as the bearer, which is what supabase-js does.
    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        ctx: Option<&TenantContext>,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let bearer = match ctx {
            Some(ctx) if !ctx.token().is_empty() => ctx.token(),
            _ => self.anon_key.as_str(),
        };
        let apikey = header_value(self.anon_key.as_str())?;
        let auth = header_value(&format!("Bearer {bearer}"))?;
        Ok(request.header(APIKEY, apikey).header(AUTHORIZATION, auth))
    }

    /// Insert or update a record and return the stored row.
    ///
    /// Records that already carry an id are upserted on `id`, so saving the
    /// same record twice leaves one row.
    pub async fn upsert(&self, record: &Record, ctx: &TenantContext) -> Result<Record, ClientError> {
        let endpoint = format!("POST /rest/v1/{}", self.table);
        let mut request = self.http.post(self.rest_url(&self.table));
        let prefer = if record.id.is_some() {
            request = request.query(&[("on_conflict", "id")]);
            "resolution=merge-duplicates,return=representation"
        } else {
            "return=representation"
        };
        let request = self
            .authorized(request, Some(ctx))?
            .header(PREFER, HeaderValue::from_static(prefer))
            .json(&RatRow::from(record));

        let resp = http::send(request, &endpoint).await?;
        let mut rows: Vec<RatRow> = http::decode(resp, &endpoint).await?;
        if rows.is_empty() {
            return Err(ClientError::Deserialization {
                endpoint,
                reason: "empty representation returned".into(),
            });
        }
        Ok(rows.swap_remove(0).into())
    }

    /// List a tenant's records, most recently updated first.
    pub async fn list(&self, ctx: &TenantContext) -> Result<Vec<Record>, ClientError> {
        let endpoint = format!("GET /rest/v1/{}", self.table);
        let tenant_filter = format!("eq.{}", ctx.tenant_id);
        let request = self.http.get(self.rest_url(&self.table)).query(&[
            ("tenant_id", tenant_filter.as_str()),
            ("select", "*"),
            ("order", "updated_at.desc"),
        ]);
        let request = self.authorized(request, Some(ctx))?;

        let resp = http::send(request, &endpoint).await?;
        let rows: Vec<RatRow> = http::decode(resp, &endpoint).await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    /// Append an audit row.
    pub async fn insert_audit(
        &self,
        entry: &AuditEntry,
        ctx: &TenantContext,
    ) -> Result<(), ClientError> {
        let endpoint = format!("POST /rest/v1/{}", self.audit_table);
        let row = AuditRow {
            action: entry.action.as_str(),
            resource_id: &entry.resource_id,
            tenant_id: entry.tenant_id.as_str(),
            strategy: entry.strategy,
            user_id: entry.user_id.as_deref(),
            created_at: entry.timestamp,
        };
        let request = self
            .authorized(self.http.post(self.rest_url(&self.audit_table)), Some(ctx))?
            .header(PREFER, HeaderValue::from_static("return=minimal"))
            .json(&row);

        let resp = http::send(request, &endpoint).await?;
        http::ensure_success(resp, &endpoint).await?;
        Ok(())
    }

    /// Whether the REST endpoint answers at all. Any non-5xx response
    /// counts: a 401 still proves the network path is up.
    pub async fn probe(&self) -> bool {
        let request = match self.authorized(self.http.get(self.rest_url("")), None) {
            Ok(r) => r,
            Err(_) => return false,
        };
        match request.send().await {
            Ok(resp) => !resp.status().is_server_error(),
            Err(e) => {
                tracing::debug!(error = %e, "supabase probe failed");
                false
            }
        }
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(raw)
        .map_err(|_| ClientError::Config(crate::config::ConfigError::InvalidHeader))
}
