//! In-memory storage backend using DashMap.
//!
//! PostgREST tables are keyed by `(table, id)` and hold snake_case rows.
//! Backend API records are keyed by id and hold camelCase documents. The
//! two surfaces do not share data, mirroring two separate services.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

struct Inner {
    rows: DashMap<(String, String), Value>,
    records: DashMap<String, Value>,
    supabase_down: AtomicBool,
    backend_down: AtomicBool,
}

/// Simulated outage switches, toggled through `POST /_stub/outage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outage {
    #[serde(default)]
    pub supabase: bool,
    #[serde(default)]
    pub backend: bool,
}

/// Shared application state. Clones share the same data.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                rows: DashMap::new(),
                records: DashMap::new(),
                supabase_down: AtomicBool::new(false),
                backend_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn rows(&self) -> &DashMap<(String, String), Value> {
        &self.inner.rows
    }

    pub fn records(&self) -> &DashMap<String, Value> {
        &self.inner.records
    }

    pub fn outage(&self) -> Outage {
        Outage {
            supabase: self.inner.supabase_down.load(Ordering::SeqCst),
            backend: self.inner.backend_down.load(Ordering::SeqCst),
        }
    }

    pub fn set_outage(&self, outage: Outage) {
        self.inner
            .supabase_down
            .store(outage.supabase, Ordering::SeqCst);
        self.inner
            .backend_down
            .store(outage.backend, Ordering::SeqCst);
    }

    /// Rows of `table` whose `tenant_id` equals `tenant`, or all rows when
    /// `tenant` is `None`.
    pub fn rows_for(&self, table: &str, tenant: Option<&str>) -> Vec<Value> {
        self.rows()
            .iter()
            .filter(|e| e.key().0 == table)
            .filter(|e| tenant.map_or(true, |t| e.value()["tenant_id"] == t))
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn records_for(&self, tenant: &str) -> Vec<Value> {
        let mut out: Vec<Value> = self
            .records()
            .iter()
            .filter(|e| e.value()["tenantId"] == tenant)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
        out
    }
}
