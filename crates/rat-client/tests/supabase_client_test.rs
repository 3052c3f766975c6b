//! Contract tests for SupabaseClient against a wiremock PostgREST.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST   | `/rest/v1/rat_activities` | `upsert_*` |
//! | GET    | `/rest/v1/rat_activities` | `list_*` |
//! | POST   | `/rest/v1/audit_log` | `insert_audit_*` |
//! | GET    | `/rest/v1/` | `probe_*` |

use rat_client::{RatClient, RatClientConfig};
use rat_core::{
    AuditAction, AuditEntry, Record, RecordId, StrategyKind, TenantContext, TenantId, Timestamp,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> RatClient {
    let config = RatClientConfig::local_mock(&server.uri(), "http://127.0.0.1:1").unwrap();
    RatClient::new(config).unwrap()
}

fn ctx() -> TenantContext {
    TenantContext::new(TenantId::new("acme").unwrap(), "user-jwt")
}

fn stored_row(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "tenant_id": "acme",
        "created_at": "2026-03-02T09:30:45.123456+00:00",
        "updated_at": "2026-03-02T09:30:45.123456+00:00",
        "activity_name": "Payroll",
        "purpose": null,
        "legal_basis": null,
        "data_categories": [],
        "data_subjects": [],
        "retention_period": null,
        "status": "draft",
        "details": {}
    })
}

// ── POST /rest/v1/rat_activities ────────────────────────────────────

#[tokio::test]
async fn upsert_new_record_returns_database_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rat_activities"))
        .and(header("apikey", "test-anon-key"))
        .and(header("authorization", "Bearer user-jwt"))
        .and(header_exists("prefer"))
        .and(body_partial_json(json!({ "tenant_id": "acme", "activity_name": "Payroll" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([stored_row("db-1")])))
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::new(TenantId::new("acme").unwrap()).with_activity_name("Payroll");
    let stored = client(&server)
        .supabase()
        .unwrap()
        .upsert(&record, &ctx())
        .await
        .unwrap();

    assert_eq!(stored.id.unwrap().as_str(), "db-1");
    assert_eq!(stored.activity_name.as_deref(), Some("Payroll"));
}

#[tokio::test]
async fn upsert_with_id_targets_conflict_column() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rat_activities"))
        .and(query_param("on_conflict", "id"))
        .and(body_partial_json(json!({ "id": "db-7" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored_row("db-7")])))
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::new(TenantId::new("acme").unwrap())
        .with_id(RecordId::new("db-7").unwrap());
    let stored = client(&server)
        .supabase()
        .unwrap()
        .upsert(&record, &ctx())
        .await
        .unwrap();
    assert_eq!(stored.id.unwrap().as_str(), "db-7");
}

#[tokio::test]
async fn upsert_401_is_auth_expired() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rat_activities"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })),
        )
        .mount(&server)
        .await;

    let record = Record::new(TenantId::new("acme").unwrap());
    let err = client(&server)
        .supabase()
        .unwrap()
        .upsert(&record, &ctx())
        .await
        .unwrap_err();
    assert!(err.is_auth_expired());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn upsert_empty_representation_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rat_activities"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    let record = Record::new(TenantId::new("acme").unwrap());
    let err = client(&server)
        .supabase()
        .unwrap()
        .upsert(&record, &ctx())
        .await
        .unwrap_err();
    assert!(matches!(err, rat_client::ClientError::Deserialization { .. }));
}

#[tokio::test]
async fn upsert_503_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rat_activities"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let record = Record::new(TenantId::new("acme").unwrap());
    let err = client(&server)
        .supabase()
        .unwrap()
        .upsert(&record, &ctx())
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.status(), Some(503));
}

// ── GET /rest/v1/rat_activities ─────────────────────────────────────

#[tokio::test]
async fn list_filters_by_tenant() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/rat_activities"))
        .and(query_param("tenant_id", "eq.acme"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([stored_row("db-1"), stored_row("db-2")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let records = client(&server)
        .supabase()
        .unwrap()
        .list(&ctx())
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.tenant_id.as_str() == "acme"));
}

// ── POST /rest/v1/audit_log ─────────────────────────────────────────

#[tokio::test]
async fn insert_audit_posts_snake_case_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_log"))
        .and(body_partial_json(json!({
            "action": "update",
            "resource_id": "db-1",
            "tenant_id": "acme",
            "strategy": "remote"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let entry = AuditEntry {
        action: AuditAction::Update,
        resource_id: "db-1".into(),
        tenant_id: TenantId::new("acme").unwrap(),
        strategy: StrategyKind::Remote,
        user_id: None,
        timestamp: Timestamp::now(),
    };
    client(&server)
        .supabase()
        .unwrap()
        .insert_audit(&entry, &ctx())
        .await
        .unwrap();
}

// ── GET /rest/v1/ ───────────────────────────────────────────────────

#[tokio::test]
async fn probe_reachable_even_when_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(client(&server).supabase().unwrap().probe().await);
}

#[tokio::test]
async fn probe_unreachable_on_closed_port() {
    let config =
        RatClientConfig::local_mock("http://127.0.0.1:1", "http://127.0.0.1:1").unwrap();
    let client = RatClient::new(config).unwrap();
    assert!(!client.supabase().unwrap().probe().await);
}
