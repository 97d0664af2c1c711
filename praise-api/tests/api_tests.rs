//! HTTP API tests
//!
//! Drive the router with `oneshot` requests carrying the caller header.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::*;
use praise_api::auth::USER_ID_HEADER;
use praise_api::build_router;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

fn request(method: &str, uri: &str, user_id: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user_id {
        builder = builder.header(USER_ID_HEADER, id.to_string());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

#[tokio::test]
async fn test_health_endpoint_no_caller_required() {
    let env = setup().await;
    let app = build_router(env.state.clone());

    let (status, body) = send(&app, request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "praise-api");
    assert_eq!(body["database"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_missing_caller_is_unauthorized() {
    let env = setup().await;
    let app = build_router(env.state.clone());

    let (status, body) = send(&app, request("GET", "/api/periods", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_or_malformed_caller_is_unauthorized() {
    let env = setup().await;
    let app = build_router(env.state.clone());

    let (status, _) = send(&app, request("GET", "/api/periods", Some(Uuid::new_v4()), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let malformed = Request::builder()
        .uri("/api/periods")
        .header(USER_ID_HEADER, "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_not_found_error_body() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let app = build_router(env.state.clone());

    let uri = format!("/api/periods/{}", Uuid::new_v4());
    let (status, body) = send(&app, request("GET", &uri, Some(admin.id), None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_permission_denied_is_forbidden() {
    let env = setup().await;
    let alice = quantifier(&env.pool, "alice").await;
    let app = build_router(env.state.clone());

    let body = json!({ "name": "March", "endDate": "2030-03-31T00:00:00Z" });
    let (status, body) = send(&app, request("POST", "/api/periods", Some(alice.id), Some(body))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_create_period_returns_created() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let app = build_router(env.state.clone());

    let body = json!({ "name": "March", "endDate": "2030-03-31T00:00:00Z" });
    let (status, body) = send(&app, request("POST", "/api/periods", Some(admin.id), Some(body))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "March");
    assert_eq!(body["status"], "OPEN");

    let (status, body) = send(&app, request("GET", "/api/periods", Some(admin.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let app = build_router(env.state.clone());

    let body = json!({ "name": "March" });
    let (status, body) = send(&app, request("POST", "/api/periods", Some(admin.id), Some(body))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_validation_error_code() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let app = build_router(env.state.clone());

    let body = json!({ "name": "   ", "endDate": "2030-03-31T00:00:00Z" });
    let (status, body) = send(&app, request("POST", "/api/periods", Some(admin.id), Some(body))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_quantification_round_trip() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let alice = quantifier(&env.pool, "alice").await;
    let bob = quantifier(&env.pool, "bob").await;
    let carol = quantifier(&env.pool, "carol").await;
    let giver = account(&env.pool, "giver", None).await;
    let receiver = account(&env.pool, "receiver", None).await;
    let period = current_period(&env.pool).await;
    let item = recent_praise(&env.pool, &giver, &receiver).await;
    let app = build_router(env.state.clone());

    let uri = format!("/api/periods/{}/verifyQuantifierPoolSize", period.id);
    let (status, body) = send(&app, request("GET", &uri, Some(admin.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantifierPoolDeficitSize"], 0);

    let uri = format!("/api/periods/{}/assignQuantifiers", period.id);
    let (status, body) = send(&app, request("PATCH", &uri, Some(admin.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "QUANTIFY");
    assert_eq!(body["praiseCount"], 1);

    // Assigning again conflicts with the new status
    let (status, body) = send(&app, request("PATCH", &uri, Some(admin.id), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "STATE_CONFLICT");

    let uri = format!("/api/praise/{}/quantify", item.id);
    for (user, score) in [(&alice, 5), (&bob, 8), (&carol, 13)] {
        let (status, body) = send(
            &app,
            request("PATCH", &uri, Some(user.id), Some(json!({ "score": score }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], item.id.to_string());
    }

    let uri = format!("/api/praise/{}", item.id);
    let (status, body) = send(&app, request("GET", &uri, Some(admin.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 8.67);
    assert_eq!(body["quantifications"].as_array().unwrap().len(), 3);

    let uri = format!("/api/praise/{}/quantify", item.id);
    let (status, _) = send(
        &app,
        request("PATCH", &uri, Some(alice.id), Some(json!({ "score": 4 }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/periods/{}/close", period.id);
    let (status, body) = send(&app, request("PATCH", &uri, Some(admin.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CLOSED");

    let (status, body) = send(&app, request("GET", "/api/eventlogs?limit=2", Some(admin.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["typeKey"], "PERIOD");
}

#[tokio::test]
async fn test_role_change_endpoints() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let alice = user(&env.pool, "alice", &[]).await;
    let app = build_router(env.state.clone());

    let uri = format!("/api/users/{}/addRole", alice.id);
    let (status, body) = send(
        &app,
        request("PATCH", &uri, Some(admin.id), Some(json!({ "role": "QUANTIFIER" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["roles"].as_array().unwrap().contains(&json!("QUANTIFIER")));

    let uri = format!("/api/users/{}/removeRole", admin.id);
    let (status, _) = send(
        &app,
        request("PATCH", &uri, Some(admin.id), Some(json!({ "role": "ADMIN" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_period_of_praise_endpoint() {
    let env = setup().await;
    let alice = user(&env.pool, "alice", &[]).await;
    let giver = account(&env.pool, "giver", None).await;
    let receiver = account(&env.pool, "receiver", None).await;
    let period = current_period(&env.pool).await;
    let inside = recent_praise(&env.pool, &giver, &receiver).await;
    let after = praise_at(&env.pool, &giver, &receiver, period.end_date + chrono::Duration::days(1)).await;
    let app = build_router(env.state.clone());

    let uri = format!("/api/praise/{}/period", inside.id);
    let (status, body) = send(&app, request("GET", &uri, Some(alice.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], period.id.to_string());

    let uri = format!("/api/praise/{}/period", after.id);
    let (status, body) = send(&app, request("GET", &uri, Some(alice.id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());

    let uri = format!("/api/praise/{}/period", Uuid::new_v4());
    let (status, _) = send(&app, request("GET", &uri, Some(alice.id), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
