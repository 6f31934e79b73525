use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;
use validator::ValidateEmail;

use backstage_types::api::{
    AuthResponse, Claims, IsAdminResponse, LoginRequest, MeResponse, RegisterRequest,
};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_LIFETIME_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;
    let email = req.email.trim().to_string();

    if !email.validate_email() {
        return Err(AppError::Validation("A valid email address is required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let lookup = email.clone();
    if state.db(move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(AppError::Conflict("An account with this email already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let now = chrono::Utc::now();
    let stored_email = email.clone();
    state
        .db(move |db| db.create_user(user_id, &stored_email, &password_hash, now))
        .await
        .map_err(duplicate_email)?;

    info!("Registered {} ({})", email, user_id);
    let token = create_token(&state.jwt_secret, user_id, &email)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            email,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(req) = payload?;
    let invalid = || AppError::Auth("Invalid email or password".into());

    let email = req.email.trim().to_string();
    let user = state
        .db(move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;

    Ok(Json(AuthResponse {
        user_id: user.id,
        email: user.email,
        token,
    }))
}

/// Issue a fresh token for a still-valid one.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<AuthResponse>> {
    let user_id = claims.sub;
    let user = state
        .db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| AppError::Auth("Account no longer exists".into()))?;

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    Ok(Json(AuthResponse {
        user_id: user.id,
        email: user.email,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<MeResponse>> {
    let user_id = claims.sub;
    let user = state
        .db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| AppError::Auth("Account no longer exists".into()))?;

    Ok(Json(MeResponse {
        user_id: user.id,
        email: user.email,
    }))
}

pub async fn is_admin(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<IsAdminResponse>> {
    let user_id = claims.sub;
    let is_admin = state.db(move |db| db.is_admin(user_id)).await?;
    Ok(Json(IsAdminResponse { is_admin }))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn create_token(secret: &str, user_id: Uuid, email: &str) -> AppResult<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// A registration that lost the race to the same email hits the UNIQUE
/// constraint instead of the lookup above.
fn duplicate_email(err: AppError) -> AppError {
    match err {
        AppError::Remote(e) if backstage_db::is_constraint_violation(&e) => {
            AppError::Conflict("An account with this email already exists".into())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let id = Uuid::new_v4();
        let token = create_token("s3cret", id, "a@example.com").unwrap();
        let claims = decode_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@example.com");
        assert!(decode_token(&token, "other").is_err());
    }

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("correct horse").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"correct horse", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }

    #[test]
    fn losing_a_registration_race_is_a_conflict() {
        let db = backstage_db::Database::open_in_memory().unwrap();
        let now = chrono::Utc::now();
        db.create_user(Uuid::new_v4(), "a@example.com", "hash", now).unwrap();
        let err = db
            .create_user(Uuid::new_v4(), "a@example.com", "hash", now)
            .unwrap_err();

        let mapped = duplicate_email(AppError::Remote(err));
        assert_eq!(mapped.status(), StatusCode::CONFLICT);
        assert_eq!(mapped.to_string(), "An account with this email already exists");

        let other = duplicate_email(AppError::Remote(anyhow::anyhow!("disk full")));
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
