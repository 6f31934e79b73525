//! Media gallery uploads, downloads and deletion.

mod common;

use axum::http::{Method, StatusCode, header};
use chrono::Utc;
use common::{TestApp, body_bytes, body_json, empty_request, multipart_request};
use uuid::Uuid;

use backstage_storage::Bucket;
use backstage_types::models::{MediaItem, MediaType};

#[tokio::test]
async fn upload_list_and_download() {
    let app = TestApp::new().await;
    let (owner_id, owner) = app.register("client@example.com").await;
    let event_id = app.create_event(&owner, 100.0).await;

    let response = app
        .send(multipart_request(
            Method::POST,
            &format!("/events/{event_id}/media"),
            &owner,
            "party.JPG",
            "image/jpeg",
            b"jpeg-bytes",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let item = body_json(response).await;
    assert_eq!(item["media_type"], "image");
    assert_eq!(item["uploaded_by"], owner_id.to_string());
    let media_id = item["id"].as_str().unwrap().to_string();
    let key = item["key"].as_str().unwrap().to_string();
    assert!(key.starts_with(&format!("{event_id}/image-")));
    assert!(key.ends_with(".jpg"));

    let response = app
        .send(empty_request(Method::GET, &format!("/events/{event_id}/media"), Some(&owner)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], media_id.as_str());

    let response = app
        .send(empty_request(
            Method::GET,
            &format!("/media/{media_id}/download"),
            Some(&owner),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let file_name = key.rsplit('/').next().unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{file_name}\"").as_str()
    );
    assert_eq!(body_bytes(response).await, b"jpeg-bytes");
}

#[tokio::test]
async fn strangers_cannot_see_the_gallery() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("client@example.com").await;
    let (_, stranger) = app.register("stranger@example.com").await;
    let event_id = app.create_event(&owner, 100.0).await;

    let response = app
        .send(empty_request(Method::GET, &format!("/events/{event_id}/media"), Some(&stranger)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(multipart_request(
            Method::POST,
            &format!("/events/{event_id}/media"),
            &stranger,
            "clip.mp4",
            "video/mp4",
            b"mp4",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_removes_object_then_row() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("client@example.com").await;
    let event_id = app.create_event(&owner, 100.0).await;

    let response = app
        .send(multipart_request(
            Method::POST,
            &format!("/events/{event_id}/media"),
            &owner,
            "clip.mp4",
            "video/mp4",
            b"mp4",
        ))
        .await;
    let item = body_json(response).await;
    let media_id: Uuid = item["id"].as_str().unwrap().parse().unwrap();
    let key = item["key"].as_str().unwrap().to_string();

    let response = app
        .send(empty_request(Method::DELETE, &format!("/media/{media_id}"), Some(&owner)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(app.db().get_media(media_id).unwrap().is_none());
    assert!(
        app.state
            .storage
            .read_object(Bucket::EventMedia, &key)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn unresolvable_legacy_url_keeps_the_row() {
    let app = TestApp::new().await;
    let (owner_id, owner) = app.register("client@example.com").await;
    let event_id = app.create_event(&owner, 100.0).await;

    let item = MediaItem {
        id: Uuid::new_v4(),
        event_id,
        url: "https://cdn.example.com/uploads/photo.jpg".into(),
        key: None,
        media_type: MediaType::Image,
        uploaded_by: owner_id,
        created_at: Utc::now(),
    };
    app.db().insert_media(&item).unwrap();

    let response = app
        .send(empty_request(Method::DELETE, &format!("/media/{}", item.id), Some(&owner)))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["error"].as_str().unwrap().contains("photo.jpg"));
    assert!(app.db().get_media(item.id).unwrap().is_some());
}

#[tokio::test]
async fn oversized_uploads_are_413_at_any_size() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("client@example.com").await;
    let event_id = app.create_event(&owner, 100.0).await;
    let limit = app.state.max_upload_bytes;

    // just over the limit, caught after the part is read
    let response = app
        .send(multipart_request(
            Method::POST,
            &format!("/events/{event_id}/media"),
            &owner,
            "big.mp4",
            "video/mp4",
            &vec![0u8; limit + 10],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"], "File exceeds the 5 MB upload limit");

    // past the body limit too, so the multipart reader itself gives up
    let response = app
        .send(multipart_request(
            Method::POST,
            &format!("/events/{event_id}/media"),
            &owner,
            "huge.mp4",
            "video/mp4",
            &vec![0u8; limit + 2 * 1024 * 1024 + 10],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"], "File exceeds the 5 MB upload limit");
    assert!(app.db().list_media(event_id).unwrap().is_empty());
}
