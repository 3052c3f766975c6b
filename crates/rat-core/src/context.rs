//! Explicit tenant and credential context passed to every persistence call.

use zeroize::Zeroizing;

use crate::identity::TenantId;

/// Who is writing, and on behalf of which organization.
///
/// Custom `Debug` redacts the access token.
#[derive(Clone)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    /// Bearer token forwarded to remote stores.
    pub access_token: Zeroizing<String>,
    pub user_id: Option<String>,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, access_token: impl Into<String>) -> Self {
        Self {
            tenant_id,
            access_token: Zeroizing::new(access_token.into()),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn token(&self) -> &str {
        self.access_token.as_str()
    }
}

impl std::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let ctx = TenantContext::new(TenantId::new("acme").unwrap(), "secret-jwt").with_user("u-1");
        let rendered = format!("{ctx:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret-jwt"));
        assert_eq!(ctx.token(), "secret-jwt");
    }
}
