mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use common::{mirror_url, test_config, ScriptedTransport, API};
use scorecards_sync::server::build_router;
use scorecards_sync::state::{DashboardState, SharedState};

const SERVICES: &str = r#"{"services": [
    {"org": "acme", "repo": "billing", "score": 92, "team": "Payments", "checks_hash": "abc",
     "installed": true, "check_results": {"readme": "pass", "license": "fail"}},
    {"org": "acme", "repo": "ledger", "score": 60, "team": "Payments", "checks_hash": "old",
     "check_results": {"readme": "fail"}, "excluded_checks": [{"check": "license", "reason": "internal"}]},
    {"org": "acme", "repo": "search", "score": 30, "team": {"primary": "Discovery", "all": ["Discovery", "Payments"]},
     "check_results": {"readme": "pass", "license": "pass"}}
]}"#;

const CHECKS: &str = r#"{"version": "3", "categories": ["Docs", "Legal"], "checks": [
    {"id": "readme", "name": "README", "category": "Docs"},
    {"id": "license", "name": "License", "category": "Legal", "weight": 5}
]}"#;

fn fixture() -> (TempDir, Arc<ScriptedTransport>, SharedState, Router) {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(mirror_url("registry/all-services.json"), 200, SERVICES);
    transport.respond(mirror_url("all-checks.json"), 200, CHECKS);
    transport.respond(mirror_url("current-checks.json"), 200, r#"{"checks_hash": "abc"}"#);
    transport.respond(
        mirror_url("teams/all-teams.json"),
        200,
        r#"{"teams": {"payments": {"name": "Payments", "description": "Money"}, "design": {"name": "Design"}}}"#,
    );

    let dir = TempDir::new().unwrap();
    let state = DashboardState::with_transport(test_config(dir.path()), transport.clone(), None);
    let router = build_router(state.clone());
    (dir, transport, state, router)
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (_dir, _transport, _state, router) = fixture();
    let (status, body) = call(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["token_present"], false);
    assert_eq!(body["services"]["count"], 0);
}

#[tokio::test]
async fn test_services_carry_staleness() {
    let (_dir, _transport, _state, router) = fixture();

    let (status, body) = call(&router, Method::GET, "/services", None).await;
    assert_eq!(status, StatusCode::OK);
    let services = body.as_array().unwrap();
    assert_eq!(services.len(), 3);
    assert_eq!(services[0]["staleness"]["is_stale"], false);
    assert_eq!(services[1]["staleness"]["is_stale"], true);
    assert_eq!(services[2]["staleness"]["service_hash"], "unknown");

    let (_, stale) = call(&router, Method::GET, "/services?stale_only=true", None).await;
    assert_eq!(stale.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_service_stats() {
    let (_dir, _transport, _state, router) = fixture();
    let (status, body) = call(&router, Method::GET, "/services/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["avg_score"], 61);
    assert_eq!(body["ranks"]["platinum"], 1);
    assert_eq!(body["staleness"]["stale"], 2);
    assert_eq!(body["stale_installed"], 0);
    assert_eq!(body["current_checks_hash"], "abc");
}

#[tokio::test]
async fn test_refresh_surfaces_load_errors() {
    let (_dir, transport, _state, router) = fixture();
    transport.clear(&mirror_url("registry/all-services.json"));

    let (status, body) = call(&router, Method::POST, "/services/refresh", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_checks_grouped_by_category() {
    let (_dir, _transport, _state, router) = fixture();
    let (status, body) = call(&router, Method::GET, "/checks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "3");
    assert_eq!(body["by_category"][0]["category"], "Docs");
    assert_eq!(body["by_category"][1]["checks"][0]["weight"], 5);
}

#[tokio::test]
async fn test_check_adoption_by_team() {
    let (_dir, _transport, _state, router) = fixture();

    let (status, body) = call(&router, Method::GET, "/checks/license/adoption", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overall"]["total"], 3);
    assert_eq!(body["overall"]["excluded"], 1);
    assert_eq!(body["overall"]["active_total"], 2);
    assert_eq!(body["overall"]["percentage"], 50);
    assert_eq!(body["excluded_services"][0]["exclusion_reason"], "internal");

    // Discovery passes (100%) and sorts ahead of Payments (0%) by default.
    assert_eq!(body["teams"][0]["team_name"], "Discovery");
    assert_eq!(body["teams"][1]["team_name"], "Payments");
    assert_eq!(body["teams"][1]["services"][0]["check_status"], "fail");
    assert_eq!(body["teams"][1]["services"][1]["check_status"], "excluded");

    let (_, asc) = call(&router, Method::GET, "/checks/license/adoption?direction=asc", None).await;
    assert_eq!(asc["teams"][0]["team_name"], "Payments");
}

#[tokio::test]
async fn test_unknown_check_is_not_found() {
    let (_dir, _transport, _state, router) = fixture();
    let (status, _) = call(&router, Method::GET, "/checks/nope/adoption", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_all_checks_adoption_and_filter() {
    let (_dir, _transport, _state, router) = fixture();

    let (_, all) = call(&router, Method::GET, "/checks/adoption", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["check_id"], "readme");
    assert_eq!(all[0]["percentage"], 67);

    let (status, matched) = call(
        &router,
        Method::POST,
        "/checks/filter",
        Some(serde_json::json!({"filters": {"readme": "pass", "license": "pass"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(matched.as_array().unwrap().len(), 1);
    assert_eq!(matched[0]["repo"], "search");
}

#[tokio::test]
async fn test_teams_merge_registry() {
    let (_dir, _transport, _state, router) = fixture();

    let (status, body) = call(&router, Method::GET, "/teams", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registry_loaded"], true);
    assert_eq!(body["unassigned_services"], 0);

    let teams = body["teams"].as_array().unwrap();
    let ids: Vec<&str> = teams.iter().map(|t| t["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["design", "discovery", "payments"]);
    assert_eq!(teams[0]["statistics"]["service_count"], 0);
    assert_eq!(teams[2]["description"], "Money");
    assert_eq!(teams[2]["statistics"]["average_score"], 76);
    assert_eq!(teams[2]["rank"], "gold");
    assert_eq!(teams[2]["rank_summary"], "1 Platinum, 1 Silver");
}

#[tokio::test]
async fn test_team_services_include_secondary_owners() {
    let (_dir, _transport, _state, router) = fixture();

    let (_, body) = call(&router, Method::GET, "/teams/Payments/services", None).await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, _) = call(&router, Method::GET, "/teams/Nobody/services", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, names) = call(&router, Method::GET, "/teams/names", None).await;
    assert_eq!(names, serde_json::json!(["Discovery", "Payments"]));
}

#[tokio::test]
async fn test_team_profile() {
    let (_dir, transport, _state, router) = fixture();
    transport.respond(
        mirror_url("teams/payments.json"),
        200,
        r#"{"name": "Payments", "aliases": ["billing"], "metadata": {"slack": "pay-eng"}}"#,
    );

    let (status, body) = call(&router, Method::GET, "/teams/payments/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Payments");
    assert_eq!(body["aliases"], serde_json::json!(["billing"]));
    assert_eq!(body["metadata"]["slack"], "pay-eng");

    let (status, _) = call(&router, Method::GET, "/teams/nobody/profile", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_workflow_widget_lifecycle() {
    let (_dir, _transport, state, router) = fixture();

    let (status, _) = call(&router, Method::GET, "/workflows/global", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&router, Method::POST, "/workflows/global/open", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interval_ms"], 30_000);

    // No token: the refresh reaches the caller as 401.
    let (status, _) = call(&router, Method::POST, "/workflows/global/refresh", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&router, Method::GET, "/workflows/global?status=queued", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filter"], "queued");
    assert_eq!(body["error"], "GitHub token required");

    let (status, _) = call(
        &router,
        Method::POST,
        "/workflows/global/interval",
        Some(serde_json::json!({"interval_ms": 1000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&router, Method::POST, "/workflows/global/close", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.scheduler.active_scopes().is_empty());
}

#[tokio::test]
async fn test_service_workflows_with_token() {
    let (_dir, transport, state, router) = fixture();
    state.tokens.set(Some("ghp_test")).await;
    let created = chrono::Utc::now().to_rfc3339();
    transport.respond(
        format!("{}/repos/acme/billing/actions/runs", API),
        200,
        serde_json::json!({"total_count": 1, "workflow_runs": [
            {"id": 9, "status": "queued", "created_at": created, "updated_at": created,
             "html_url": "https://example.test/runs/9"}
        ]})
        .to_string(),
    );

    call(&router, Method::POST, "/workflows/service/acme/billing/open", None).await;
    let (status, body) = call(&router, Method::POST, "/workflows/service/acme/billing/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["badge_count"], 1);
    assert_eq!(body["runs"][0]["id"], 9);

    let (status, _) = call(
        &router,
        Method::POST,
        "/workflows/service/interval",
        Some(serde_json::json!({"interval_ms": 20000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    call(&router, Method::POST, "/workflows/service/acme/billing/close", None).await;
    state.dispose();
}

#[tokio::test]
async fn test_token_endpoints() {
    let (_dir, transport, state, router) = fixture();
    transport.respond(format!("{}/user", API), 401, "");

    let (status, body) = call(
        &router,
        Method::POST,
        "/auth/token",
        Some(serde_json::json!({"token": "ghp_bad"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "rejected");
    assert!(!state.tokens.has_token().await);

    state.tokens.set(Some("ghp_stored")).await;
    let (status, _) = call(&router, Method::DELETE, "/auth/token", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!state.tokens.has_token().await);
}
