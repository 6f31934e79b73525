//! Identity endpoints and the server-side admin check.

mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, body_json, empty_request, json_request};
use serde_json::json;

#[tokio::test]
async fn register_login_and_me() {
    let app = TestApp::new().await;
    let (id, _) = app.register("planner@example.com").await;

    let response = app
        .send(json_request(
            Method::POST,
            "/auth/login",
            None,
            json!({ "email": "planner@example.com", "password": "password123" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let me = app.send(empty_request(Method::GET, "/auth/me", Some(&token))).await;
    assert_eq!(me.status(), StatusCode::OK);
    let body = body_json(me).await;
    assert_eq!(body["user_id"], id.to_string());
    assert_eq!(body["email"], "planner@example.com");
}

#[tokio::test]
async fn wrong_password_and_missing_token_are_401() {
    let app = TestApp::new().await;
    app.register("planner@example.com").await;

    let response = app
        .send(json_request(
            Method::POST,
            "/auth/login",
            None,
            json!({ "email": "planner@example.com", "password": "nope-nope" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(response).await["error"].is_string());

    let response = app.send(empty_request(Method::GET, "/events", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(empty_request(Method::GET, "/events", Some("not-a-jwt")))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let app = TestApp::new().await;
    app.register("dup@example.com").await;
    let response = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "email": "DUP@example.com", "password": "password123" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn is_admin_reads_the_profile_role() {
    let app = TestApp::new().await;
    let (_, client) = app.register("client@example.com").await;
    let (_, admin) = app.register_admin("admin@example.com").await;

    let response = app
        .send(empty_request(Method::GET, "/auth/is-admin", Some(&client)))
        .await;
    assert_eq!(body_json(response).await["is_admin"], false);

    let response = app
        .send(empty_request(Method::GET, "/auth/is-admin", Some(&admin)))
        .await;
    assert_eq!(body_json(response).await["is_admin"], true);
}

#[tokio::test]
async fn malformed_json_is_a_400_with_error_body() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            Method::POST,
            "/auth/login",
            None,
            json!({ "email": "x@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}
