//! Administrative functions under `POST /functions/v1/{name}`.
//!
//! Every function re-checks the caller's admin role against the database
//! before looking at its input.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::info;
use uuid::Uuid;

use backstage_types::api::{
    ChapterAnalytics, ChapterAnalyticsRequest, CreateChapterRequest, UpdateUserChapterRequest,
    UpdateUserRoleRequest,
};
use backstage_types::models::{Chapter, Role};

use crate::error::{AppError, AppResult};
use crate::middleware::RequireAdmin;
use crate::state::{AppState, AppStateInner};

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

pub async fn run_function(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(name): Path<String>,
    body: Bytes,
) -> AppResult<Response> {
    info!("{} invoked {}", admin.sub, name);
    match name.as_str() {
        "get-all-user-profiles" => {
            let users = state.db(|db| db.user_summaries(None)).await?;
            Ok(Json(users).into_response())
        }
        "get-all-chapters" => {
            let chapters = state.db(|db| db.list_chapter_summaries()).await?;
            Ok(Json(chapters).into_response())
        }
        "get-chapter-analytics" => {
            let req: ChapterAnalyticsRequest = parse_body(&body)?;
            Ok(Json(chapter_analytics(&state, req.chapter_id).await?).into_response())
        }
        "update-user-chapter" => {
            let req: UpdateUserChapterRequest = parse_body(&body)?;
            update_user_chapter(&state, req).await
        }
        "update-user-role" => {
            let req: UpdateUserRoleRequest = parse_body(&body)?;
            update_user_role(&state, req).await
        }
        "create-chapter" => {
            let req: CreateChapterRequest = parse_body(&body)?;
            create_chapter(&state, req).await
        }
        other => Err(AppError::NotFound(format!("Unknown function '{other}'"))),
    }
}

/// Share of events with a signed contract, as a percentage. Zero events
/// yields zero.
pub fn close_percentage(signed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        signed as f64 / total as f64 * 100.0
    }
}

async fn chapter_analytics(state: &AppStateInner, chapter_id: Uuid) -> AppResult<ChapterAnalytics> {
    let (chapter, stats, total_members, members) = state
        .db(move |db| {
            Ok((
                db.get_chapter(chapter_id)?,
                db.chapter_event_stats(chapter_id)?,
                db.count_chapter_members(chapter_id)?,
                db.user_summaries(Some(chapter_id))?,
            ))
        })
        .await?;
    let chapter = chapter.ok_or_else(|| AppError::NotFound("Chapter not found".into()))?;

    Ok(ChapterAnalytics {
        chapter,
        total_members,
        total_events: stats.total_events,
        average_budget: stats.average_budget,
        ltv: stats.total_budget,
        close_percentage: close_percentage(stats.signed_contracts, stats.total_events),
        members,
    })
}

async fn update_user_chapter(state: &AppStateInner, req: UpdateUserChapterRequest) -> AppResult<Response> {
    if let Some(chapter_id) = req.chapter_id {
        if state.db(move |db| db.get_chapter(chapter_id)).await?.is_none() {
            return Err(AppError::BadRequest(format!("Unknown chapter '{chapter_id}'")));
        }
    }

    let user_id = req.user_id;
    let chapter_id = req.chapter_id;
    let profile = state
        .db(move |db| {
            if !db.set_chapter(user_id, chapter_id)? {
                return Ok(None);
            }
            db.get_profile(user_id)
        })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(profile).into_response())
}

async fn update_user_role(state: &AppStateInner, req: UpdateUserRoleRequest) -> AppResult<Response> {
    let role: Role = req
        .new_role
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown role '{}'", req.new_role)))?;

    let user_id = req.user_id;
    let profile = state
        .db(move |db| {
            if !db.set_role(user_id, role)? {
                return Ok(None);
            }
            db.get_profile(user_id)
        })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!("{} is now {}", user_id, role);
    Ok(Json(profile).into_response())
}

async fn create_chapter(state: &AppStateInner, req: CreateChapterRequest) -> AppResult<Response> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Chapter name is required".into()));
    }

    let lookup = name.clone();
    if state.db(move |db| db.get_chapter_by_name(&lookup)).await?.is_some() {
        return Err(AppError::Conflict(format!("Chapter '{name}' already exists")));
    }

    let chapter = Chapter {
        id: Uuid::new_v4(),
        name,
        created_at: Utc::now(),
    };
    let row = chapter.clone();
    state.db(move |db| db.create_chapter(&row)).await?;

    Ok((axum::http::StatusCode::CREATED, Json(chapter)).into_response())
}
