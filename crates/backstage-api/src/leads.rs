use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use backstage_types::api::{LeadQuery, LeadRequest, LeadStatusRequest};
use backstage_types::models::Lead;

use crate::error::{AppError, AppResult};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

fn normalize(mut req: LeadRequest) -> LeadRequest {
    let blank_to_none = |v: Option<String>| {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    };
    req.school = req.school.trim().to_string();
    req.fraternity = req.fraternity.trim().to_string();
    req.contact_phone = req.contact_phone.trim().to_string();
    req.instagram_handle = blank_to_none(req.instagram_handle);
    req.contact_name = blank_to_none(req.contact_name);
    req.notes = blank_to_none(req.notes);
    req
}

fn lead_not_found() -> AppError {
    AppError::NotFound("Lead not found".into())
}

/// GET /leads?q=&status=
pub async fn list_leads(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<LeadQuery>,
) -> AppResult<Json<Vec<Lead>>> {
    let leads = state.db(|db| db.list_leads()).await?;
    let search = query.q.unwrap_or_default();
    let status = query.status.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());

    let filtered = leads
        .into_iter()
        .filter(|lead| lead.matches(&search))
        .filter(|lead| status.as_ref().is_none_or(|s| lead.status.eq_ignore_ascii_case(s)))
        .collect();
    Ok(Json(filtered))
}

pub async fn create_lead(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<LeadRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;
    let req = normalize(req);
    req.validate()?;

    let now = Utc::now();
    let lead = Lead {
        id: Uuid::new_v4(),
        school: req.school,
        fraternity: req.fraternity,
        contact_phone: req.contact_phone,
        contact_email: None,
        instagram_handle: req.instagram_handle,
        contact_name: req.contact_name,
        status: req.status.as_str().to_string(),
        notes: req.notes,
        created_by: admin.sub,
        created_at: now,
        updated_at: now,
    };
    let row = lead.clone();
    state.db(move |db| db.insert_lead(&row)).await?;

    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn update_lead(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(lead_id): Path<Uuid>,
    payload: Result<Json<LeadRequest>, JsonRejection>,
) -> AppResult<Json<Lead>> {
    let Json(req) = payload?;
    let req = normalize(req);
    req.validate()?;

    let now = Utc::now();
    let lead = state
        .db(move |db| db.update_lead(lead_id, &req, now))
        .await?
        .ok_or_else(lead_not_found)?;
    Ok(Json(lead))
}

/// PATCH /leads/{id}/status
pub async fn update_lead_status(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(lead_id): Path<Uuid>,
    payload: Result<Json<LeadStatusRequest>, JsonRejection>,
) -> AppResult<Json<Lead>> {
    let Json(req) = payload?;
    let now = Utc::now();
    let lead = state
        .db(move |db| db.update_lead_status(lead_id, req.status, now))
        .await?
        .ok_or_else(lead_not_found)?;
    Ok(Json(lead))
}

pub async fn delete_lead(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(lead_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.db(move |db| db.delete_lead(lead_id)).await? {
        return Err(lead_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
