//! Route definitions for the RAT stub.
//!
//! Serves the two remote surfaces the persistence chain writes to, with
//! responses that deserialize cleanly into `rat-client`'s types:
//! PostgREST-style snake_case rows under `/rest/v1`, and camelCase records
//! under `/api/v1/rats`.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::store::{AppState, Outage};

const TENANT_HEADER: &str = "x-tenant-id";

/// Build the complete router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health))
        // Supabase (PostgREST)
        .route("/rest/v1/", get(rest_probe))
        .route("/rest/v1/:table", post(rest_insert).get(rest_select))
        // Backend API
        .route("/api/v1/rats", post(rat_create).get(rat_list))
        .route("/api/v1/rats/:id", put(rat_put))
        // Drills
        .route("/_stub/outage", get(outage_get).post(outage_set))
        .fallback(not_implemented)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> StatusCode {
    StatusCode::OK
}

// ── Supabase (PostgREST) ────────────────────────────────────────────

/// Outage and `apikey` checks shared by every `/rest/v1` route.
fn supabase_gate(state: &AppState, headers: &HeaderMap) -> Option<Response> {
    if state.outage().supabase {
        return Some(error(StatusCode::SERVICE_UNAVAILABLE, "simulated outage"));
    }
    if !headers.contains_key("apikey") {
        return Some(error(StatusCode::UNAUTHORIZED, "No API key found in request"));
    }
    None
}

async fn rest_probe(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match supabase_gate(&state, &headers) {
        Some(resp) => resp,
        None => Json(json!({ "swagger": "2.0" })).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct InsertQuery {
    on_conflict: Option<String>,
}

async fn rest_insert(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<InsertQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(resp) = supabase_gate(&state, &headers) {
        return resp;
    }
    let rows = match body {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return error(StatusCode::BAD_REQUEST, "body must be an object or an array"),
    };
    let upsert = query.on_conflict.as_deref() == Some("id");

    let mut stored = Vec::with_capacity(rows.len());
    for row in rows {
        let Value::Object(mut row) = row else {
            return error(StatusCode::BAD_REQUEST, "rows must be objects");
        };
        if !row.get("tenant_id").is_some_and(Value::is_string) {
            return error(StatusCode::BAD_REQUEST, "tenant_id is required");
        }
        let id = match row.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                row.insert("id".into(), json!(id));
                id
            }
        };

        let key = (table.clone(), id);
        let previous = state.rows().get(&key).map(|e| e.value().clone());
        if previous.is_some() && !upsert {
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "code": "23505",
                    "message": "duplicate key value violates unique constraint"
                })),
            )
                .into_response();
        }
        stamp(&mut row, previous.as_ref(), "created_at", "updated_at");

        let row = Value::Object(row);
        state.rows().insert(key, row.clone());
        stored.push(row);
    }

    let minimal = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|p| p.contains("return=minimal"));
    if minimal {
        StatusCode::CREATED.into_response()
    } else {
        (StatusCode::CREATED, Json(Value::Array(stored))).into_response()
    }
}

/// Keep an existing creation time; fill timestamps the writer left out.
fn stamp(row: &mut Map<String, Value>, previous: Option<&Value>, created: &str, updated: &str) {
    let now = json!(Utc::now().to_rfc3339());
    if let Some(prev) = previous.and_then(|p| p.get(created)).filter(|v| !v.is_null()) {
        row.insert(created.to_string(), prev.clone());
    }
    for field in [created, updated] {
        if row.get(field).map_or(true, Value::is_null) {
            row.insert(field.to_string(), now.clone());
        }
    }
}

async fn rest_select(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(resp) = supabase_gate(&state, &headers) {
        return resp;
    }
    let tenant = query.get("tenant_id").and_then(|f| f.strip_prefix("eq."));
    let mut rows = state.rows_for(&table, tenant);

    if let Some((column, direction)) = query.get("order").and_then(|o| o.split_once('.')) {
        rows.sort_by(|a, b| a[column].as_str().cmp(&b[column].as_str()));
        if direction == "desc" {
            rows.reverse();
        }
    }
    Json(Value::Array(rows)).into_response()
}

// ── Backend API ─────────────────────────────────────────────────────

/// Outage, credential and tenant checks shared by `/api/v1/rats` routes.
/// Returns the tenant named by `X-Tenant-Id`.
fn backend_gate(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    if state.outage().backend {
        return Err(error(StatusCode::SERVICE_UNAVAILABLE, "simulated outage"));
    }
    if !headers.contains_key("authorization") {
        return Err(error(StatusCode::UNAUTHORIZED, "missing bearer token"));
    }
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "X-Tenant-Id header is required"))
}

fn record_body(body: Value, tenant: &str) -> Result<Map<String, Value>, Response> {
    let Value::Object(record) = body else {
        return Err(error(StatusCode::BAD_REQUEST, "body must be an object"));
    };
    match record.get("tenantId").and_then(Value::as_str) {
        Some(t) if t == tenant => Ok(record),
        Some(_) => Err(error(
            StatusCode::FORBIDDEN,
            "tenantId does not match X-Tenant-Id",
        )),
        None => Err(error(StatusCode::BAD_REQUEST, "tenantId is required")),
    }
}

async fn rat_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let tenant = match backend_gate(&state, &headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let mut record = match record_body(body, &tenant) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let id = match record.get("id").and_then(Value::as_str) {
        Some(id) if state.records().contains_key(id) => {
            return error(StatusCode::CONFLICT, "record already exists; use PUT")
        }
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    record.insert("id".into(), json!(id));
    stamp(&mut record, None, "createdAt", "updatedAt");

    let record = Value::Object(record);
    state.records().insert(id, record.clone());
    (StatusCode::CREATED, Json(record)).into_response()
}

async fn rat_put(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let tenant = match backend_gate(&state, &headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let mut record = match record_body(body, &tenant) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let previous = state.records().get(&id).map(|e| e.value().clone());
    if previous.as_ref().is_some_and(|p| p["tenantId"] != tenant.as_str()) {
        return error(StatusCode::FORBIDDEN, "record belongs to another tenant");
    }
    record.insert("id".into(), json!(id));
    stamp(&mut record, previous.as_ref(), "createdAt", "updatedAt");

    let record = Value::Object(record);
    state.records().insert(id, record.clone());
    let status = if previous.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(json!({ "data": record }))).into_response()
}

async fn rat_list(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match backend_gate(&state, &headers) {
        Ok(tenant) => Json(Value::Array(state.records_for(&tenant))).into_response(),
        Err(resp) => resp,
    }
}

// ── Drills ──────────────────────────────────────────────────────────

async fn outage_get(State(state): State<AppState>) -> Json<Outage> {
    Json(state.outage())
}

async fn outage_set(State(state): State<AppState>, Json(outage): Json<Outage>) -> Json<Outage> {
    state.set_outage(outage);
    tracing::info!(supabase = outage.supabase, backend = outage.backend, "outage switches set");
    Json(outage)
}

async fn not_implemented() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}
