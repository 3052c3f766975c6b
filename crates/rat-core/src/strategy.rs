//! Names of the persistence tiers.

use serde::{Deserialize, Serialize};

/// Which tier of the fallback chain handled a write or a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Hosted database (Supabase REST).
    Remote,
    /// Backend REST API.
    Backend,
    /// Durable local storage.
    Local,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Backend => "backend",
            Self::Local => "local",
        }
    }

    /// Whether the tier is a network store.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
