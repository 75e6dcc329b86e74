//! Integration tests: build the router over the in-memory store and drive it
//! with `oneshot` requests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use hourbank_api::{AppState, config::ApiConfig};
use hourbank_core::auth::{ROLE_HR, ROLE_OWNER, issue_access_token};
use hourbank_core::models::employee::Employee;
use hourbank_core::provider::{
    ExternalEntry, ExternalUser, ProviderConnector, ProviderError, TimeInterval, TimeProvider,
};
use hourbank_core::store::MemoryStore;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const TENANT: i64 = 7;

struct FakeProvider;

#[async_trait]
impl TimeProvider for FakeProvider {
    async fn list_users(
        &self,
        workspace_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ExternalUser>, ProviderError> {
        if workspace_id != "ws-1" {
            return Err(ProviderError::Status {
                status: 404,
                message: "workspace not found".into(),
            });
        }
        Ok(vec![ExternalUser {
            id: "u-ana".into(),
            name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
        }])
    }

    async fn list_entries(
        &self,
        _workspace_id: &str,
        _user_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ExternalEntry>, ProviderError> {
        Ok(vec![ExternalEntry {
            id: "e1".into(),
            time_interval: TimeInterval {
                start: "2026-02-10T09:00:00Z".into(),
                end: Some("2026-02-10T17:00:00Z".into()),
                duration: Some("PT8H".into()),
            },
            ..Default::default()
        }])
    }
}

struct FakeConnector;

impl ProviderConnector for FakeConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn TimeProvider>, ProviderError> {
        if api_key == "bad-key" {
            return Err(ProviderError::Status {
                status: 401,
                message: "unauthorized".into(),
            });
        }
        Ok(Arc::new(FakeProvider))
    }
}

async fn app() -> Router {
    let store = MemoryStore::new();
    store
        .insert_employee(Employee {
            id: 1,
            tenant_id: TENANT,
            name: "Ana".into(),
            email: Some("ana@example.com".into()),
            status: "active".into(),
            hire_date: None,
            termination_date: None,
        })
        .await;

    let state = AppState {
        store: Arc::new(store),
        providers: Arc::new(FakeConnector),
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            jwt_secret: SECRET.into(),
        },
        shutdown: CancellationToken::new(),
    };
    hourbank_api::router(state)
}

fn token(role: &str) -> String {
    issue_access_token("user-1", TENANT, role, Duration::minutes(5), SECRET.as_bytes()).unwrap()
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    role: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = call_raw(app, method, uri, role, body).await;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json)
}

async fn call_raw(
    app: &Router,
    method: &str,
    uri: &str,
    role: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(role)));
    }
    let req = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, bytes.to_vec())
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let (status, json) = call(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["store_connected"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn protected_routes_require_manager_token() {
    let app = app().await;
    let (status, json) = call(&app, "GET", "/time-bank/settings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");

    let (status, _) = call(&app, "GET", "/time-bank/settings", Some("employee"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = call(&app, "GET", "/time-bank/settings", Some(ROLE_OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["target_daily_minutes"], 480);
}

#[tokio::test]
async fn provider_setup_and_sync() {
    let app = app().await;

    let (_, json) = call(&app, "GET", "/integrations/provider", Some(ROLE_OWNER), None).await;
    assert_eq!(json, serde_json::json!({"configured": false}));

    let (status, json) = call(
        &app,
        "POST",
        "/integrations/provider",
        Some(ROLE_OWNER),
        Some(serde_json::json!({"api_key": "bad-key", "workspace_id": "ws-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "invalid provider api key");

    let (status, _) = call(
        &app,
        "POST",
        "/integrations/provider/sync",
        Some(ROLE_OWNER),
        Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = call(
        &app,
        "POST",
        "/integrations/provider",
        Some(ROLE_OWNER),
        Some(serde_json::json!({"api_key": "abcd1234efgh", "workspace_id": "ws-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["configured"], true);
    assert_eq!(json["api_key_masked"], "abcd****efgh");
    assert_eq!(json["users_found"], 1);

    let (status, json) = call(
        &app,
        "POST",
        "/integrations/provider/sync",
        Some(ROLE_OWNER),
        Some(serde_json::json!({"start_date": "2026-02-09", "end_date": "2026-02-13"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["employees_mapped"], 1);
    assert_eq!(json["entries_upserted"], 1);

    let (status, json) = call(
        &app,
        "GET",
        "/time-entries?employee_id=1",
        Some(ROLE_OWNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().map(Vec::len), Some(1));
    assert_eq!(json[0]["duration_seconds"], 28800);

    let (status, json) = call(
        &app,
        "GET",
        "/integrations/provider/status",
        Some(ROLE_HR),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["configured"], true);
    assert_eq!(json["entries_total"], 1);
    assert_eq!(json["mapped_employees"], 1);
}

#[tokio::test]
async fn closed_period_override_is_hr_only() {
    let app = app().await;
    let (status, _) = call(
        &app,
        "POST",
        "/integrations/provider/sync",
        Some(ROLE_OWNER),
        Some(serde_json::json!({"allow_closed_period": true})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_query_values_are_rejected() {
    let app = app().await;
    let (status, json) = call(
        &app,
        "GET",
        "/time-entries?employee_id=abc",
        Some(ROLE_OWNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");

    let (status, json) = call(
        &app,
        "GET",
        "/time-bank/summary?start_date=2026-02-10&end_date=2026-02-01",
        Some(ROLE_OWNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "end_date must be >= start_date");
}

#[tokio::test]
async fn adjustment_workflow_feeds_summary() {
    let app = app().await;

    let (status, json) = call(
        &app,
        "POST",
        "/time-bank/adjustments",
        Some(ROLE_HR),
        Some(serde_json::json!({
            "employee_id": 1,
            "effective_date": "2026-02-10",
            "seconds_delta": 60,
            "minutes_delta": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        "seconds_delta and minutes_delta cannot be used together"
    );

    let (status, created) = call(
        &app,
        "POST",
        "/time-bank/adjustments",
        Some(ROLE_HR),
        Some(serde_json::json!({
            "employee_id": 1,
            "effective_date": "2026-02-10",
            "minutes_delta": 90,
            "reason": "overtime"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_i64().unwrap();

    let uri = format!("/time-bank/adjustments/{id}/approve");
    let (status, json) = call(&app, "POST", &uri, Some(ROLE_HR), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "approved");

    let (status, json) = call(&app, "POST", &uri, Some(ROLE_HR), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "invalid status transition");

    let (_, json) = call(
        &app,
        "GET",
        "/time-bank/adjustments?start_date=2026-02-01&end_date=2026-02-28&status=approved",
        Some(ROLE_HR),
        None,
    )
    .await;
    assert_eq!(json.as_array().map(Vec::len), Some(1));

    let (status, json) = call(
        &app,
        "GET",
        "/time-bank/summary?start_date=2026-02-09&end_date=2026-02-13",
        Some(ROLE_HR),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["employees"][0]["adjustment_seconds"], 5400);
    assert_eq!(json["employees"][0]["expected_seconds"], 144000);
    assert_eq!(json["totals"]["balance_seconds"], 5400 - 144000);
}

#[tokio::test]
async fn closure_lifecycle() {
    let app = app().await;
    let close = |start: &str, end: &str| {
        serde_json::json!({"start_date": start, "end_date": end, "note": "payroll"})
    };

    let (status, closed) = call(
        &app,
        "POST",
        "/time-bank/closures/close",
        Some(ROLE_HR),
        Some(close("2026-02-10", "2026-02-20")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["status"], "closed");
    let id = closed["id"].as_i64().unwrap();

    let (status, json) = call(
        &app,
        "POST",
        "/time-bank/closures/close",
        Some(ROLE_HR),
        Some(close("2026-02-01", "2026-02-15")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");

    // adjustments inside a closed period are locked
    let (status, _) = call(
        &app,
        "POST",
        "/time-bank/adjustments",
        Some(ROLE_HR),
        Some(serde_json::json!({
            "employee_id": 1,
            "effective_date": "2026-02-12",
            "seconds_delta": 60
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = call(
        &app,
        "GET",
        &format!("/time-bank/closures/{id}/employees"),
        Some(ROLE_HR),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["employees"][0]["employee_name"], "Ana");

    let (status, csv) = call_raw(
        &app,
        "GET",
        &format!("/time-bank/closures/{id}/export.csv"),
        Some(ROLE_HR),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.starts_with("employee_id,name,worked_seconds"));

    let (status, json) = call(
        &app,
        "POST",
        &format!("/time-bank/closures/{id}/reopen"),
        Some(ROLE_HR),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "reopened");
    assert_eq!(json["note"], "payroll");

    let (status, _) = call(
        &app,
        "POST",
        "/time-bank/closures/close",
        Some(ROLE_HR),
        Some(close("2026-02-16", "2026-02-28")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&app, "GET", "/time-bank/closures", Some(ROLE_HR), None).await;
    assert_eq!(json.as_array().map(Vec::len), Some(2));
    assert_eq!(json[0]["period_end"], "2026-02-28");

    let (status, _) = call(
        &app,
        "POST",
        "/time-bank/closures/999/reopen",
        Some(ROLE_HR),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let app = app().await;

    let (status, json) = call(
        &app,
        "POST",
        "/time-bank/adjustments",
        Some(ROLE_HR),
        Some(serde_json::json!({
            "employee_id": "abc",
            "effective_date": "2026-02-10",
            "seconds_delta": 60
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert!(json["message"].as_str().unwrap().contains("employee_id"));

    let (status, json) = call(
        &app,
        "POST",
        "/time-bank/adjustments",
        Some(ROLE_HR),
        Some(serde_json::json!({
            "employee_id": 1,
            "effective_date": "2026-02-10",
            "minutes_delta": 1.5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");

    // no content type on a required body
    let (status, json) = call(&app, "POST", "/time-bank/closures/close", Some(ROLE_HR), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");

    let (status, json) = call(
        &app,
        "POST",
        "/integrations/provider/sync",
        Some(ROLE_HR),
        Some(serde_json::json!({"allow_closed_period": "yes"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn oversized_adjustment_is_rejected() {
    let app = app().await;
    let (status, json) = call(
        &app,
        "POST",
        "/time-bank/adjustments",
        Some(ROLE_HR),
        Some(serde_json::json!({
            "employee_id": 1,
            "effective_date": "2026-02-10",
            "seconds_delta": i64::MIN
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().starts_with("delta must be within"));

    let (status, json) = call(
        &app,
        "GET",
        "/time-bank/summary?start_date=2026-02-09&end_date=2026-02-13",
        Some(ROLE_HR),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["employees"][0]["adjustment_seconds"], 0);
    assert_eq!(json["employees"][0]["balance_seconds"], -144_000);
}
