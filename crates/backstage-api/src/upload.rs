use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::error::{AppError, AppResult};

/// The `file` part of a multipart upload.
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Pull the `file` field out of a multipart body, skipping any other parts.
pub async fn read_file_field(mut multipart: Multipart, max_bytes: usize) -> AppResult<UploadedFile> {
    let limit_mb = max_bytes / (1024 * 1024);
    let over_limit = |err: MultipartError| upload_error(err, limit_mb);

    while let Some(field) = multipart.next_field().await.map_err(over_limit)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(over_limit)?;

        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".into()));
        }
        if data.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(limit_mb));
        }
        return Ok(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }
    Err(AppError::BadRequest("Missing multipart field 'file'".into()))
}

/// Bodies past the router's hard limit fail inside the multipart reader;
/// they are still an oversized upload.
fn upload_error(err: MultipartError, limit_mb: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit_mb)
    } else {
        AppError::from(err)
    }
}
