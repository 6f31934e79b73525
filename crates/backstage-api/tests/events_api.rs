//! Event lifecycle over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, body_json, empty_request, json_request};
use serde_json::json;

#[tokio::test]
async fn negative_budget_is_rejected_and_nothing_is_stored() {
    let app = TestApp::new().await;
    let (owner, token) = app.register("client@example.com").await;

    let response = app
        .send(json_request(
            Method::POST,
            "/events",
            Some(&token),
            json!({ "date": "2030-01-01", "budget": -5, "phone": "+15551234567" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Budget"));

    assert!(app.db().list_events_for_owner(owner).unwrap().is_empty());
}

#[tokio::test]
async fn bad_phone_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.register("client@example.com").await;
    let response = app
        .send(json_request(
            Method::POST,
            "/events",
            Some(&token),
            json!({ "date": "2030-01-01", "budget": 10, "phone": "0123" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_then_list_round_trip() {
    let app = TestApp::new().await;
    let (_, token) = app.register("client@example.com").await;

    let upcoming = app.create_event(&token, 2500.0).await;
    let response = app
        .send(json_request(
            Method::POST,
            "/events",
            Some(&token),
            json!({ "date": "2001-06-01", "budget": 0, "phone": "15551234567", "artist_name": "  " }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let past = body_json(response).await;
    assert!(past["artist_name"].is_null());

    let response = app.send(empty_request(Method::GET, "/events", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["upcoming"].as_array().unwrap().len(), 1);
    assert_eq!(body["upcoming"][0]["id"], upcoming.to_string());
    assert_eq!(body["upcoming"][0]["budget"], 2500.0);
    assert_eq!(body["upcoming"][0]["name"], "Spring Formal");
    assert_eq!(body["past"].as_array().unwrap().len(), 1);
    assert_eq!(body["past"][0]["id"], past["id"]);
}

#[tokio::test]
async fn updates_are_scoped_to_the_owner() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("owner@example.com").await;
    let (_, stranger) = app.register("stranger@example.com").await;
    let (_, admin) = app.register_admin("admin@example.com").await;
    let event_id = app.create_event(&owner, 100.0).await;

    let edit = json!({ "date": "2030-05-05", "budget": 300, "phone": "+15551234567" });

    let response = app
        .send(json_request(Method::PUT, &format!("/events/{event_id}"), Some(&stranger), edit.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(json_request(Method::PUT, &format!("/events/{event_id}"), Some(&owner), edit.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["budget"], 300.0);

    // the owner path never matches for an admin who does not own the event
    let response = app
        .send(json_request(Method::PUT, &format!("/events/{event_id}"), Some(&admin), edit.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(json_request(
            Method::PUT,
            &format!("/admin/events/{event_id}"),
            Some(&admin),
            json!({ "date": "2030-05-05", "budget": 450, "phone": "+15551234567" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["budget"], 450.0);

    let response = app
        .send(json_request(Method::PUT, &format!("/admin/events/{event_id}"), Some(&owner), edit))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reading_someone_elses_event_is_forbidden() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("owner@example.com").await;
    let (_, stranger) = app.register("stranger@example.com").await;
    let (_, admin) = app.register_admin("admin@example.com").await;
    let event_id = app.create_event(&owner, 100.0).await;

    let uri = format!("/events/{event_id}");
    assert_eq!(
        app.send(empty_request(Method::GET, &uri, Some(&stranger))).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.send(empty_request(Method::GET, &uri, Some(&admin))).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn admin_calendar_labels_owners() {
    let app = TestApp::new().await;
    let (owner_id, owner) = app.register("owner@example.com").await;
    let (_, admin) = app.register_admin("admin@example.com").await;
    app.db()
        .update_profile(owner_id, Some("State"), Some("Sigma Chi"))
        .unwrap();
    app.create_event(&owner, 100.0).await;

    let response = app
        .send(empty_request(
            Method::GET,
            "/admin/events?from=2030-01-01&to=2030-12-31",
            Some(&admin),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["owner_label"], "State Sigma Chi");

    let response = app
        .send(empty_request(
            Method::GET,
            &format!("/admin/users/{owner_id}/events"),
            Some(&admin),
        ))
        .await;
    assert_eq!(body_json(response).await["upcoming"].as_array().unwrap().len(), 1);
}
