use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use backstage_storage::Bucket;
use backstage_storage::keys::content_type_for_key;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /storage/{bucket}/{*key}. Every bucket is public.
pub async fn serve_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let not_found = || AppError::NotFound("Object not found".into());
    let bucket: Bucket = bucket.parse().map_err(|_| not_found())?;

    // Malformed keys are indistinguishable from missing ones to the caller.
    let opened = state
        .storage
        .open_object(bucket, &key)
        .await
        .map_err(|_| not_found())?;
    let (file, len) = opened.ok_or_else(not_found)?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for_key(&key).to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
