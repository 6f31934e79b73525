use axum::{
    Extension, Json,
    extract::{Multipart, State, rejection::JsonRejection},
};
use tracing::{info, warn};

use backstage_storage::Bucket;
use backstage_storage::keys::{avatar_key, extension};
use backstage_types::api::{Claims, UpdateProfileRequest};
use backstage_types::models::Profile;

use crate::error::{AppError, AppResult};
use crate::state::{AppState, AppStateInner};
use crate::upload::read_file_field;

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn load_profile(state: &AppStateInner, user_id: uuid::Uuid) -> AppResult<Profile> {
    state
        .db(move |db| db.get_profile(user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Profile>> {
    Ok(Json(load_profile(&state, claims.sub).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> AppResult<Json<Profile>> {
    let Json(req) = payload?;
    let school = trimmed(req.school);
    let fraternity = trimmed(req.fraternity);

    let user_id = claims.sub;
    let profile = state
        .db(move |db| db.update_profile(user_id, school.as_deref(), fraternity.as_deref()))
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;
    Ok(Json(profile))
}

/// POST /profile/avatar. The previous avatar object is removed once the
/// profile points at the new one.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> AppResult<Json<Profile>> {
    let file = read_file_field(multipart, state.max_upload_bytes).await?;
    let is_image = file
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"));
    if !is_image {
        return Err(AppError::Validation("Avatar must be an image".into()));
    }

    let user_id = claims.sub;
    let key = avatar_key(user_id, &extension(&file.file_name));
    let stored = state.storage.put_object(Bucket::Avatars, &key, &file.data).await?;

    let previous = state
        .db(move |db| db.set_avatar(user_id, &stored.url, &stored.key))
        .await?;
    if let Some(old_key) = previous.filter(|old| *old != key) {
        if let Err(e) = state.storage.remove_object(Bucket::Avatars, &old_key).await {
            warn!("Failed to remove replaced avatar {}: {}", old_key, e);
        }
    }

    info!("{} updated their avatar", user_id);
    Ok(Json(load_profile(&state, user_id).await?))
}
