//! Remote client error types.

use crate::config::ConfigError;

/// Errors from Supabase and backend API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connect, DNS, TLS, timeout).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The remote returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response body did not match the expected shape.
    #[error("failed to deserialize response from {endpoint}: {reason}")]
    Deserialization { endpoint: String, reason: String },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The caller's token was refused. Retrying with the same token is
    /// pointless; the user has to sign in again.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Worth retrying: transport failures, timeouts, throttling and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Deserialization { .. } | Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ClientError {
        ClientError::Api {
            endpoint: "POST /rest/v1/rat_activities".into(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn auth_statuses_classified() {
        assert!(api(401).is_auth_expired());
        assert!(api(403).is_auth_expired());
        assert!(!api(404).is_auth_expired());
        assert!(!api(401).is_transient());
    }

    #[test]
    fn transient_statuses_classified() {
        assert!(api(500).is_transient());
        assert!(api(503).is_transient());
        assert!(api(429).is_transient());
        assert!(!api(409).is_transient());
        assert!(!api(422).is_transient());
    }

    #[test]
    fn display_includes_endpoint_and_status() {
        let msg = api(409).to_string();
        assert!(msg.contains("rat_activities"));
        assert!(msg.contains("409"));
    }
}
