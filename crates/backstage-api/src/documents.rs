use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::Redirect,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use backstage_storage::Bucket;
use backstage_storage::keys::{document_key, document_key_from_url, extension};
use backstage_types::models::{DocumentRef, DocumentSlot, Event, Role};

use crate::error::{AppError, AppResult};
use crate::events::{load_accessible_event, publish};
use crate::middleware::Caller;
use crate::state::{AppState, AppStateInner};
use crate::upload::read_file_field;

fn parse_slot(raw: &str) -> AppResult<DocumentSlot> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Unknown document slot '{raw}'")))
}

fn ensure_can_write(caller: &Caller, event: &Event, slot: DocumentSlot) -> AppResult<()> {
    let role = if caller.is_admin { Role::Admin } else { Role::Client };
    if slot.can_write(role, caller.user_id == event.owner_id) {
        Ok(())
    } else {
        Err(AppError::Permission(format!(
            "You cannot change the {} for this event",
            slot.label()
        )))
    }
}

async fn write_slot(
    state: &AppStateInner,
    event_id: Uuid,
    slot: DocumentSlot,
    document: Option<DocumentRef>,
) -> AppResult<Event> {
    let now = Utc::now();
    let update = state
        .db(move |db| db.set_event_document(event_id, slot, document.as_ref(), now))
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;
    Ok(publish(state, update))
}

/// PUT /events/{id}/documents/{slot}
pub async fn upload_document(
    State(state): State<AppState>,
    caller: Caller,
    Path((event_id, slot)): Path<(Uuid, String)>,
    multipart: Multipart,
) -> AppResult<Json<Event>> {
    let slot = parse_slot(&slot)?;
    let event = load_accessible_event(&state, &caller, event_id).await?;
    ensure_can_write(&caller, &event, slot)?;

    let file = read_file_field(multipart, state.max_upload_bytes).await?;
    let key = document_key(
        event.id,
        slot,
        Utc::now().timestamp_millis(),
        &extension(&file.file_name),
    );
    let stored = state
        .storage
        .put_object(Bucket::EventDocuments, &key, &file.data)
        .await?;

    let updated = write_slot(
        &state,
        event.id,
        slot,
        Some(DocumentRef {
            url: stored.url,
            key: Some(stored.key),
        }),
    )
    .await?;

    info!("{} uploaded {} for event {}", caller.user_id, slot, event.id);
    Ok(Json(updated))
}

/// DELETE /events/{id}/documents/{slot}
///
/// The object is removed before the slot is cleared; if removal fails the
/// slot keeps pointing at it.
pub async fn delete_document(
    State(state): State<AppState>,
    caller: Caller,
    Path((event_id, slot)): Path<(Uuid, String)>,
) -> AppResult<Json<Event>> {
    let slot = parse_slot(&slot)?;
    if !slot.is_deletable() {
        return Err(AppError::Permission(format!("The {} cannot be deleted", slot.label())));
    }
    let event = load_accessible_event(&state, &caller, event_id).await?;
    ensure_can_write(&caller, &event, slot)?;

    let document = event
        .documents
        .get(slot)
        .ok_or_else(|| AppError::NotFound(format!("No {} has been uploaded", slot.label())))?;

    let key = match &document.key {
        Some(key) => key.clone(),
        None => document_key_from_url(event.id, &document.url).ok_or_else(|| {
            AppError::PathResolution(format!("Cannot resolve storage path from {}", document.url))
        })?,
    };

    state.storage.remove_object(Bucket::EventDocuments, &key).await?;
    let updated = write_slot(&state, event.id, slot, None).await?;

    info!("{} removed {} from event {}", caller.user_id, slot, event.id);
    Ok(Json(updated))
}

/// GET /events/{id}/documents/{slot}: redirect to the public URL.
pub async fn download_document(
    State(state): State<AppState>,
    caller: Caller,
    Path((event_id, slot)): Path<(Uuid, String)>,
) -> AppResult<Redirect> {
    let slot = parse_slot(&slot)?;
    let event = load_accessible_event(&state, &caller, event_id).await?;
    let document = event
        .documents
        .get(slot)
        .ok_or_else(|| AppError::NotFound(format!("No {} has been uploaded", slot.label())))?;
    Ok(Redirect::temporary(&document.url))
}
