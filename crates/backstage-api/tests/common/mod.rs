#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use backstage_api::{AppState, AppStateInner, router};
use backstage_db::Database;
use backstage_gateway::dispatcher::Dispatcher;
use backstage_storage::Storage;
use backstage_types::models::Role;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const BOUNDARY: &str = "backstage-test-boundary";

/// A router over an in-memory database and a throwaway storage root.
pub struct TestApp {
    pub state: AppState,
    _storage_dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let storage_dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::new(storage_dir.path().to_path_buf(), "http://test.local")
            .await
            .expect("storage");
        let state = Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().expect("db")),
            storage,
            dispatcher: Dispatcher::new(),
            jwt_secret: TEST_SECRET.to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
        });
        Self {
            state,
            _storage_dir: storage_dir,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.expect("router is infallible")
    }

    /// Register an account and return (user id, bearer token).
    pub async fn register(&self, email: &str) -> (Uuid, String) {
        let response = self
            .send(json_request(
                Method::POST,
                "/auth/register",
                None,
                json!({ "email": email, "password": "password123" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let id = body["user_id"].as_str().unwrap().parse().unwrap();
        (id, body["token"].as_str().unwrap().to_string())
    }

    pub async fn register_admin(&self, email: &str) -> (Uuid, String) {
        let (id, token) = self.register(email).await;
        self.db().set_role(id, Role::Admin).unwrap();
        (id, token)
    }

    /// Create an event for the token's owner and return its id.
    pub async fn create_event(&self, token: &str, budget: f64) -> Uuid {
        let response = self
            .send(json_request(
                Method::POST,
                "/events",
                Some(token),
                json!({
                    "name": "Spring Formal",
                    "date": "2030-04-18",
                    "budget": budget,
                    "phone": "+15551234567"
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_str().unwrap().parse().unwrap()
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// A multipart body with a single `file` part.
pub fn multipart_request(
    method: Method,
    uri: &str,
    token: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("response body is JSON")
}
