use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio_util::io::ReaderStream;
use tracing::info;
use uuid::Uuid;

use backstage_storage::Bucket;
use backstage_storage::keys::{content_type_for_key, extension, media_key, media_key_from_url};
use backstage_types::models::{MediaItem, MediaType};

use crate::error::{AppError, AppResult};
use crate::events::load_accessible_event;
use crate::middleware::Caller;
use crate::state::{AppState, AppStateInner};
use crate::upload::read_file_field;

/// A media row the caller may act on, via its event's ownership.
async fn load_accessible_media(
    state: &AppStateInner,
    caller: &Caller,
    media_id: Uuid,
) -> AppResult<MediaItem> {
    let item = state
        .db(move |db| db.get_media(media_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Media item not found".into()))?;
    load_accessible_event(state, caller, item.event_id).await?;
    Ok(item)
}

fn object_key(item: &MediaItem) -> AppResult<String> {
    match &item.key {
        Some(key) => Ok(key.clone()),
        None => media_key_from_url(&item.url).ok_or_else(|| {
            AppError::PathResolution(format!("Cannot resolve storage path from {}", item.url))
        }),
    }
}

/// POST /events/{id}/media
pub async fn upload_media(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let event = load_accessible_event(&state, &caller, event_id).await?;
    let file = read_file_field(multipart, state.max_upload_bytes).await?;

    let media_type = file
        .content_type
        .as_deref()
        .map(MediaType::from_mime)
        .unwrap_or(MediaType::Other);
    let now = Utc::now();
    let key = media_key(
        event.id,
        media_type,
        now.timestamp_millis(),
        &extension(&file.file_name),
    );
    let stored = state
        .storage
        .put_object(Bucket::EventMedia, &key, &file.data)
        .await?;

    let item = MediaItem {
        id: Uuid::new_v4(),
        event_id: event.id,
        url: stored.url,
        key: Some(stored.key),
        media_type,
        uploaded_by: caller.user_id,
        created_at: now,
    };
    let row = item.clone();
    state.db(move |db| db.insert_media(&row)).await?;

    info!("{} added {} media to event {}", caller.user_id, media_type.as_str(), event.id);
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /events/{id}/media
pub async fn list_media(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Vec<MediaItem>>> {
    load_accessible_event(&state, &caller, event_id).await?;
    let items = state.db(move |db| db.list_media(event_id)).await?;
    Ok(Json(items))
}

/// DELETE /media/{id}: object first, then the row.
pub async fn delete_media(
    State(state): State<AppState>,
    caller: Caller,
    Path(media_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let item = load_accessible_media(&state, &caller, media_id).await?;
    let key = object_key(&item)?;

    state.storage.remove_object(Bucket::EventMedia, &key).await?;
    state.db(move |db| db.delete_media(media_id)).await?;

    info!("{} deleted media {}", caller.user_id, media_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /media/{id}/download: raw bytes as an attachment.
pub async fn download_media(
    State(state): State<AppState>,
    caller: Caller,
    Path(media_id): Path<Uuid>,
) -> AppResult<Response> {
    let item = load_accessible_media(&state, &caller, media_id).await?;
    let key = object_key(&item)?;

    let (file, len) = state
        .storage
        .open_object(Bucket::EventMedia, &key)
        .await?
        .ok_or_else(|| AppError::NotFound("Media file is missing from storage".into()))?;

    let file_name = key.rsplit('/').next().unwrap_or(&key).to_string();
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for_key(&key).to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
