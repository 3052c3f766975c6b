//! # Processing-Activity Records
//!
//! [`Record`] is one entry of a tenant's register of processing activities
//! (RAT). Only `tenantId` is mandatory; every other field may still be blank
//! while the entry is a draft in the form wizard.
//!
//! [`PendingLocalRecord`] wraps a record that was written to local storage
//! because no remote store accepted it. It carries the `syncPending` flag
//! that opportunistic sync clears once a remote store confirms the write.
//!
//! ## JSON shape
//!
//! camelCase, matching the backend API. Wizard answers that have no typed
//! field are kept in `details` and flattened back into the top-level object
//! on output, so a round trip through this type never drops a form field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::{RecordId, TenantId};
use crate::temporal::Timestamp;

/// Lawful basis for processing personal data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalBasis {
    Consent,
    Contract,
    LegalObligation,
    VitalInterest,
    PublicInterest,
    LegitimateInterest,
}

/// Review status of a register entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Draft,
    InReview,
    Approved,
    Archived,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Archived => "archived",
        }
    }
}

/// One processing-activity entry owned by a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Assigned by whichever store accepted the first write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub tenant_id: TenantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_basis: Option<LegalBasis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_period: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
    /// Untyped wizard answers.
    #[serde(default, flatten)]
    pub details: Map<String, Value>,
}

impl Record {
    /// A blank draft for the given tenant.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            id: None,
            tenant_id,
            created_at: None,
            updated_at: None,
            activity_name: None,
            purpose: None,
            legal_basis: None,
            data_categories: Vec::new(),
            data_subjects: Vec::new(),
            retention_period: None,
            status: RecordStatus::Draft,
            details: Map::new(),
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_activity_name(mut self, name: impl Into<String>) -> Self {
        self.activity_name = Some(name.into());
        self
    }

    /// Stamp `updatedAt`, and `createdAt` if this is the first save.
    pub fn touch(&mut self, now: Timestamp) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }

    /// Resource identifier used in audit entries: the record id, or the
    /// supplied fallback for records no store has assigned an id to yet.
    pub fn resource_id_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.id.as_ref().map(RecordId::as_str).unwrap_or(fallback)
    }
}

/// A record held in local storage, awaiting confirmation by a remote store.
///
/// Serialized flat: the record's own fields sit beside `localKey`,
/// `syncPending` and `savedAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLocalRecord {
    #[serde(flatten)]
    pub record: Record,
    /// Storage key within the tenant's partition.
    pub local_key: String,
    pub sync_pending: bool,
    pub saved_at: Timestamp,
    /// Id assigned by the remote store once the entry has been replayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RecordId>,
    #[serde(default)]
    pub sync_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingLocalRecord {
    /// Wrap a record that only local storage accepted.
    pub fn pending(record: Record, local_key: impl Into<String>, saved_at: Timestamp) -> Self {
        Self {
            record,
            local_key: local_key.into(),
            sync_pending: true,
            saved_at,
            remote_id: None,
            sync_attempts: 0,
            last_error: None,
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.record.tenant_id
    }

    /// Replace the record with the remote store's representation and clear
    /// the pending flag.
    pub fn mark_synced(&mut self, stored: Record) {
        self.remote_id = stored.id.clone();
        self.record = stored;
        self.sync_pending = false;
        self.last_error = None;
    }

    /// Count a failed replay, keeping the entry pending.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.sync_attempts = self.sync_attempts.saturating_add(1);
        self.last_error = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn acme() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    #[test]
    fn minimal_record_needs_only_tenant() {
        let r: Record = serde_json::from_value(json!({ "tenantId": "acme" })).unwrap();
        assert_eq!(r.tenant_id, acme());
        assert!(r.id.is_none());
        assert_eq!(r.status, RecordStatus::Draft);
        assert!(r.details.is_empty());
    }

    #[test]
    fn empty_tenant_is_rejected_at_parse() {
        let r = serde_json::from_value::<Record>(json!({ "tenantId": "" }));
        assert!(r.is_err());
        let r = serde_json::from_value::<Record>(json!({ "activityName": "x" }));
        assert!(r.is_err());
    }

    #[test]
    fn unknown_wizard_fields_survive_round_trip() {
        let input = json!({
            "tenantId": "acme",
            "activityName": "Payroll",
            "legalBasis": "legal_obligation",
            "dataCategories": ["rut", "salary"],
            "internationalTransfer": { "country": "US", "safeguard": "scc" },
            "dpoReviewed": true
        });
        let r: Record = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(r.legal_basis, Some(LegalBasis::LegalObligation));
        assert_eq!(r.details.get("dpoReviewed"), Some(&json!(true)));

        let out = serde_json::to_value(&r).unwrap();
        assert_eq!(out["internationalTransfer"], input["internationalTransfer"]);
        assert_eq!(out["dataCategories"], json!(["rut", "salary"]));
        assert_eq!(out["status"], json!("draft"));
    }

    #[test]
    fn touch_sets_created_once() {
        let mut r = Record::new(acme());
        let t1 = Timestamp::parse("2026-03-02T09:00:00Z").unwrap();
        let t2 = Timestamp::parse("2026-03-02T10:00:00Z").unwrap();
        r.touch(t1);
        r.touch(t2);
        assert_eq!(r.created_at, Some(t1));
        assert_eq!(r.updated_at, Some(t2));
    }

    #[test]
    fn pending_record_serializes_flat() {
        let saved_at = Timestamp::parse("2026-03-02T09:00:00Z").unwrap();
        let p = PendingLocalRecord::pending(Record::new(acme()), "local-1", saved_at);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["tenantId"], json!("acme"));
        assert_eq!(v["syncPending"], json!(true));
        assert_eq!(v["localKey"], json!("local-1"));
        assert!(v.get("record").is_none());

        let back: PendingLocalRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, p);
        assert!(back.record.details.is_empty());
    }

    #[test]
    fn mark_synced_clears_flag_and_adopts_remote_id() {
        let saved_at = Timestamp::now();
        let mut p = PendingLocalRecord::pending(Record::new(acme()), "local-1", saved_at);
        p.record_failure("connection refused");
        assert_eq!(p.sync_attempts, 1);

        let stored = Record::new(acme()).with_id(RecordId::new("srv-9").unwrap());
        p.mark_synced(stored);
        assert!(!p.sync_pending);
        assert_eq!(p.remote_id.as_ref().map(RecordId::as_str), Some("srv-9"));
        assert!(p.last_error.is_none());
        assert_eq!(p.sync_attempts, 1);
    }

    #[test]
    fn resource_id_falls_back_without_id() {
        let r = Record::new(acme());
        assert_eq!(r.resource_id_or("local-7"), "local-7");
        let r = r.with_id(RecordId::new("abc").unwrap());
        assert_eq!(r.resource_id_or("local-7"), "abc");
    }
}
