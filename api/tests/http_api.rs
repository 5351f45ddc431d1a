//! End-to-end tests for the HTTP surface, driven through `oneshot`

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use points_api::{create_app, ApiState};
use points_economy::{Economy, EconomyConfig, StaticTokenIdentity};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let economy = Economy::new(EconomyConfig {
        bootstrap_admins: vec!["root".to_string()],
        ..Default::default()
    })
    .unwrap();
    let identity = StaticTokenIdentity::default()
        .with_token("root-token", "root")
        .with_token("alice-token", "alice")
        .with_token("bob-token", "bob");
    create_app(ApiState::new(Arc::new(economy), Arc::new(identity)))
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn register(app: &Router, token: &str, name: &str) -> Value {
    let (status, body) = call(
        app,
        "POST",
        "/accounts",
        Some(token),
        Some(json!({ "display_name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_unknown_credential_is_401() {
    let app = app();
    let (status, body) = call(&app, "GET", "/accounts/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = call(&app, "GET", "/accounts/me", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_then_me() {
    let app = app();
    let created = register(&app, "alice-token", "Alice").await;
    assert_eq!(created["id"], "alice");
    assert_eq!(created["balance"], 0);

    let (status, me) = call(&app, "GET", "/accounts/me", Some("alice-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["account"]["display_name"], "Alice");
    assert_eq!(me["referral_stats"]["total_referrals"], 0);

    let (status, body) = call(
        &app,
        "POST",
        "/accounts",
        Some("alice-token"),
        Some(json!({ "display_name": "Again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "account_exists");
}

#[tokio::test]
async fn test_second_cycle_hits_cooldown() {
    let app = app();
    register(&app, "alice-token", "Alice").await;
    let request = json!({ "fingerprint_hash": "a".repeat(64) });

    let (status, outcome) = call(
        &app,
        "POST",
        "/mining/start",
        Some("alice-token"),
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert!(outcome["new_balance"].as_u64().unwrap() > 0);

    let (status, body) = call(&app, "POST", "/mining/start", Some("alice-token"), Some(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "cooldown_active");

    let (status, _) = call(
        &app,
        "POST",
        "/mining/start",
        Some("alice-token"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        "POST",
        "/mining/start",
        Some("alice-token"),
        Some(json!({ "fingerprint_hash": "aéééééééé" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn test_purchase_without_funds_is_402() {
    let app = app();
    register(&app, "root-token", "Root").await;
    register(&app, "alice-token", "Alice").await;

    let (status, item) = call(
        &app,
        "POST",
        "/admin/catalog",
        Some("root-token"),
        Some(json!({ "name": "Crown", "tier": "gold", "cost": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");

    let (status, body) = call(
        &app,
        "POST",
        "/marketplace/purchase",
        Some("alice-token"),
        Some(json!({ "catalog_item_id": item["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "insufficient_funds");

    let (_, inventory) = call(&app, "GET", "/marketplace/inventory", Some("alice-token"), None).await;
    assert_eq!(inventory, json!([]));
}

#[tokio::test]
async fn test_admin_routes_refuse_non_admins() {
    let app = app();
    register(&app, "root-token", "Root").await;
    register(&app, "alice-token", "Alice").await;

    let (status, body) = call(
        &app,
        "POST",
        "/admin/accounts/alice/balance",
        Some("alice-token"),
        Some(json!({ "delta": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = call(
        &app,
        "POST",
        "/admin/accounts/alice/balance",
        Some("root-token"),
        Some(json!({ "delta": 1000, "reason": "launch promo" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], 1000);

    let (status, entries) = call(&app, "GET", "/admin/audit?limit=5", Some("root-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(entries.as_array().unwrap().len() <= 5);
    assert_eq!(entries[0]["action"], "balance_adjusted");
}

#[tokio::test]
async fn test_withdrawal_is_locked() {
    let app = app();
    register(&app, "alice-token", "Alice").await;

    let (status, body) = call(
        &app,
        "POST",
        "/withdrawals/prepare",
        Some("alice-token"),
        Some(json!({ "amount": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["error"], "locked");
}

#[tokio::test]
async fn test_task_review_flow() {
    let app = app();
    register(&app, "root-token", "Root").await;
    register(&app, "bob-token", "Bob").await;

    let (status, task) = call(
        &app,
        "POST",
        "/admin/tasks",
        Some("root-token"),
        Some(json!({
            "title": "Follow us",
            "points_reward": 250,
            "task_type": "social",
            "max_completions_per_user": 1,
            "verification_type": "manual"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");

    let (_, open) = call(&app, "GET", "/tasks", Some("bob-token"), None).await;
    assert_eq!(open.as_array().unwrap().len(), 1);

    let uri = format!("/tasks/{}/submit", task["id"].as_str().unwrap());
    let (status, submitted) = call(
        &app,
        "POST",
        &uri,
        Some("bob-token"),
        Some(json!({ "proof": "screenshot.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{submitted}");
    assert_eq!(submitted["status"], "pending");

    let (_, pending) = call(&app, "GET", "/admin/submissions", Some("root-token"), None).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let review = format!(
        "/admin/submissions/{}/review",
        submitted["submission_id"].as_str().unwrap()
    );
    let (status, reviewed) = call(
        &app,
        "POST",
        &review,
        Some("root-token"),
        Some(json!({ "approve": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["final_status"], "verified");
    assert_eq!(reviewed["points_awarded"], 250);

    let (status, body) = call(
        &app,
        "POST",
        &review,
        Some("root-token"),
        Some(json!({ "approve": false, "reason": "late" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_finalized");

    let (_, me) = call(&app, "GET", "/accounts/me", Some("bob-token"), None).await;
    assert_eq!(me["account"]["balance"], 250);
}
