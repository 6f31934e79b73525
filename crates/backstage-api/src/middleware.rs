use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use backstage_types::api::Claims;

use crate::error::AppError;
use crate::state::AppState;

/// Extract and validate the JWT from the Authorization header; the decoded
/// [`Claims`] are stored as a request extension for handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing Authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Expected a Bearer token".into()))?;

    let claims = decode_token(token, &state.jwt_secret)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Auth("Invalid or expired token".into()))
}

fn claims_from_parts(parts: &Parts) -> Result<Claims, AppError> {
    parts
        .extensions
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| AppError::Auth("Not signed in".into()))
}

/// Admin-gated handlers take this extractor. Privilege is read from the
/// profile row on every request; the token carries no role.
pub struct RequireAdmin(pub Claims);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = claims_from_parts(parts)?;
        let user_id = claims.sub;
        if !state.db(move |db| db.is_admin(user_id)).await? {
            return Err(AppError::Permission("Admin access required".into()));
        }
        Ok(RequireAdmin(claims))
    }
}

/// Caller identity plus whether the profile currently holds the admin role.
pub struct Caller {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = claims_from_parts(parts)?.sub;
        let is_admin = state.db(move |db| db.is_admin(user_id)).await?;
        Ok(Caller { user_id, is_admin })
    }
}

impl Caller {
    /// Owners and admins may read and add to an event.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}
