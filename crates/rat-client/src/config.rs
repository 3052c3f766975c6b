//! Remote client configuration.
//!
//! Each remote tier is optional: a deployment without a backend API simply
//! leaves `RAT_BACKEND_URL` unset and the chain skips that tier. Values come
//! from an optional YAML file, then environment variables override them.
//!
//! Variables:
//! - `RAT_SUPABASE_URL` — enables the Supabase tier
//! - `RAT_SUPABASE_ANON_KEY` (required when `RAT_SUPABASE_URL` is set)
//! - `RAT_SUPABASE_TABLE` (default: `rat_activities`)
//! - `RAT_AUDIT_TABLE` (default: `audit_log`)
//! - `RAT_BACKEND_URL` — enables the backend API tier
//! - `RAT_TIMEOUT_SECS` (default: 30)

use std::path::Path;

use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

pub const DEFAULT_TABLE: &str = "rat_activities";
pub const DEFAULT_AUDIT_TABLE: &str = "audit_log";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the hosted Supabase project.
///
/// Custom `Debug` implementation redacts the anon key.
#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: Url,
    /// Project anon key, sent as the `apikey` header.
    pub anon_key: Zeroizing<String>,
    pub table: String,
    pub audit_table: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("table", &self.table)
            .field("audit_table", &self.audit_table)
            .finish()
    }
}

/// Connection settings for the backend REST API.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: Url,
}

/// Configuration for all remote stores.
#[derive(Debug, Clone)]
pub struct RatClientConfig {
    pub supabase: Option<SupabaseConfig>,
    pub backend: Option<BackendConfig>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// On-disk shape of the `remote` section of a config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawClientConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub supabase_table: Option<String>,
    pub audit_table: Option<String>,
    pub backend_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl RawClientConfig {
    /// Read the `remote:` section of a YAML config file. A file without that
    /// section yields all defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct File {
            #[serde(default)]
            remote: RawClientConfig,
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        let file: File = serde_yaml::from_str(&text)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))?;
        Ok(file.remote)
    }
}

impl RatClientConfig {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(RawClientConfig::default(), |k| std::env::var(k).ok())
    }

    /// Merge file values with overrides from `lookup` (normally the process
    /// environment) and validate the result.
    pub fn resolve(
        file: RawClientConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pick = |var: &str, from_file: Option<String>| {
            lookup(var).filter(|v| !v.trim().is_empty()).or(from_file)
        };

        let supabase = match pick("RAT_SUPABASE_URL", file.supabase_url) {
            Some(raw) => {
                let anon_key = pick("RAT_SUPABASE_ANON_KEY", file.supabase_anon_key)
                    .ok_or(ConfigError::MissingAnonKey)?;
                Some(SupabaseConfig {
                    url: parse_url("RAT_SUPABASE_URL", &raw)?,
                    anon_key: Zeroizing::new(anon_key),
                    table: pick("RAT_SUPABASE_TABLE", file.supabase_table)
                        .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
                    audit_table: pick("RAT_AUDIT_TABLE", file.audit_table)
                        .unwrap_or_else(|| DEFAULT_AUDIT_TABLE.to_string()),
                })
            }
            None => None,
        };

        let backend = match pick("RAT_BACKEND_URL", file.backend_url) {
            Some(raw) => Some(BackendConfig {
                url: parse_url("RAT_BACKEND_URL", &raw)?,
            }),
            None => None,
        };

        let timeout_secs = match lookup("RAT_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("RAT_TIMEOUT_SECS".into(), raw))?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            supabase,
            backend,
            timeout_secs,
        })
    }

    /// Configuration pointing at local mock servers (for testing).
    pub fn local_mock(supabase_url: &str, backend_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            supabase: Some(SupabaseConfig {
                url: parse_url("supabase", supabase_url)?,
                anon_key: Zeroizing::new("test-anon-key".into()),
                table: DEFAULT_TABLE.into(),
                audit_table: DEFAULT_AUDIT_TABLE.into(),
            }),
            backend: Some(BackendConfig {
                url: parse_url("backend", backend_url)?,
            }),
            timeout_secs: 5,
        })
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("RAT_SUPABASE_ANON_KEY is required when RAT_SUPABASE_URL is set")]
    MissingAnonKey,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
    #[error("credential contains characters not allowed in an HTTP header")]
    InvalidHeader,
    #[error("cannot read config file {0}: {1}")]
    Read(String, String),
    #[error("cannot parse config file {0}: {1}")]
    Parse(String, String),
}
