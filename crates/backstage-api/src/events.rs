use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use backstage_types::api::{AdminEventListing, Claims, EventRequest, EventWindowQuery};
use backstage_types::events::EventChange;
use backstage_types::models::{DocumentSet, Event, EventPartition, partition_events};

use crate::error::{AppError, AppResult};
use crate::middleware::{Caller, RequireAdmin};
use crate::state::{AppState, AppStateInner};

/// Blank optional text is stored as absent.
fn normalize(mut req: EventRequest) -> EventRequest {
    let blank_to_none = |v: Option<String>| {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    };
    req.name = blank_to_none(req.name);
    req.artist_name = blank_to_none(req.artist_name);
    req.phone = req.phone.trim().to_string();
    req
}

/// Load an event the caller may see: 404 when missing, 403 when it
/// belongs to someone else and the caller is not an admin.
pub(crate) async fn load_accessible_event(
    state: &AppStateInner,
    caller: &Caller,
    event_id: Uuid,
) -> AppResult<Event> {
    let event = state
        .db(move |db| db.get_event(event_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;
    if !caller.can_access(event.owner_id) {
        return Err(AppError::Permission("You do not have access to this event".into()));
    }
    Ok(event)
}

pub(crate) fn publish(state: &AppStateInner, (old, new): (Event, Event)) -> Event {
    state.dispatcher.publish(EventChange {
        old,
        new: new.clone(),
    });
    new
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<EventRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;
    let req = normalize(req);
    req.validate()?;

    let owner_id = claims.sub;
    let chapter_id = state
        .db(move |db| db.get_profile(owner_id))
        .await?
        .and_then(|p| p.chapter_id);

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        owner_id,
        chapter_id,
        name: req.name,
        date: req.date,
        artist_name: req.artist_name,
        budget: req.budget,
        phone: req.phone,
        documents: DocumentSet::default(),
        created_at: now,
        updated_at: now,
    };

    let row = event.clone();
    state.db(move |db| db.insert_event(&row)).await?;
    info!("{} created event {}", owner_id, event.id);

    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<EventPartition>> {
    let owner_id = claims.sub;
    let events = state.db(move |db| db.list_events_for_owner(owner_id)).await?;
    Ok(Json(partition_events(events, Utc::now().date_naive())))
}

pub async fn get_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Event>> {
    Ok(Json(load_accessible_event(&state, &caller, event_id).await?))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<Uuid>,
    payload: Result<Json<EventRequest>, JsonRejection>,
) -> AppResult<Json<Event>> {
    let Json(req) = payload?;
    apply_update(&state, event_id, Some(claims.sub), req).await
}

/// Admin edit path: no owner filter.
pub async fn admin_update_event(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(event_id): Path<Uuid>,
    payload: Result<Json<EventRequest>, JsonRejection>,
) -> AppResult<Json<Event>> {
    let Json(req) = payload?;
    apply_update(&state, event_id, None, req).await
}

async fn apply_update(
    state: &AppStateInner,
    event_id: Uuid,
    owner_id: Option<Uuid>,
    req: EventRequest,
) -> AppResult<Json<Event>> {
    let req = normalize(req);
    req.validate()?;

    let now = Utc::now();
    let update = state
        .db(move |db| db.update_event_fields(event_id, owner_id, &req, now))
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

    Ok(Json(publish(state, update)))
}

pub async fn admin_user_events(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<EventPartition>> {
    let events = state.db(move |db| db.list_events_for_owner(user_id)).await?;
    Ok(Json(partition_events(events, Utc::now().date_naive())))
}

/// Calendar and document overview across every client.
pub async fn admin_list_events(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(window): Query<EventWindowQuery>,
) -> AppResult<Json<Vec<AdminEventListing>>> {
    if let (Some(from), Some(to)) = (window.from, window.to) {
        if from > to {
            return Err(AppError::BadRequest("'from' must not be after 'to'".into()));
        }
    }
    let listings = state
        .db(move |db| db.list_all_events(window.from, window.to))
        .await?;
    Ok(Json(listings))
}
