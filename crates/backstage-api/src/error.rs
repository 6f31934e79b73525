use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;
use validator::ValidationErrors;

use backstage_types::api::ErrorBody;
use backstage_types::validation::describe;

/// Error type for every HTTP handler. Renders as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Submitted data failed a domain rule (budget, phone, required field).
    #[error("{0}")]
    Validation(String),

    /// No live identity, or credentials that do not check out.
    #[error("{0}")]
    Auth(String),

    /// Identity is known but lacks the capability for this action.
    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// A stored URL could not be mapped back to an object key.
    #[error("{0}")]
    PathResolution(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("File exceeds the {0} MB upload limit")]
    PayloadTooLarge(usize),

    /// Database or object store failure.
    #[error(transparent)]
    Remote(#[from] anyhow::Error),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PathResolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Remote(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Remote(err) => {
                error!(error = %err, "Remote failure");
                "An internal error occurred".to_string()
            }
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(describe(&errors))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("Malformed upload: {}", err.body_text()))
    }
}
