//! Audit trail entries emitted for every persisted write.

use serde::{Deserialize, Serialize};

use crate::identity::TenantId;
use crate::strategy::StrategyKind;
use crate::temporal::Timestamp;

/// What happened to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// First write of a record without an id.
    Create,
    /// Write of a record that already carried an id.
    Update,
    /// Replay of a locally pending record to a remote store.
    Sync,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Sync => "sync",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub action: AuditAction,
    pub resource_id: String,
    pub tenant_id: TenantId,
    /// Tier that accepted the write.
    pub strategy: StrategyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: Timestamp,
}
