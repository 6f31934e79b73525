//! Object key layout for each bucket, and recovery of keys from the public
//! URLs of rows written before keys were stored.

use uuid::Uuid;

use backstage_types::models::{DocumentSlot, MediaType};

use crate::Bucket;

/// Extension used when an upload's file name carries none.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Lowercased extension of an uploaded file name, restricted to ASCII
/// alphanumerics.
pub fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// `{eventId}/{slot}-{tsMillis}.{ext}`
pub fn document_key(event_id: Uuid, slot: DocumentSlot, ts_millis: i64, ext: &str) -> String {
    format!("{event_id}/{}-{ts_millis}.{ext}", slot.as_str())
}

/// `{eventId}/{type}-{tsMillis}.{ext}`
pub fn media_key(event_id: Uuid, media_type: MediaType, ts_millis: i64, ext: &str) -> String {
    format!("{event_id}/{}-{ts_millis}.{ext}", media_type.as_str())
}

/// `{userId}-{random}.{ext}`
pub fn avatar_key(user_id: Uuid, ext: &str) -> String {
    let suffix: u64 = rand::random();
    format!("{user_id}-{suffix:016x}.{ext}")
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Document URLs always end in the object's file name, which sits directly
/// under the event's directory.
pub fn document_key_from_url(event_id: Uuid, url: &str) -> Option<String> {
    let name = strip_query(url).rsplit('/').next()?;
    if name.is_empty() || name == ".." || name == "." {
        return None;
    }
    Some(format!("{event_id}/{name}"))
}

/// Media keys are everything after the bucket segment. URLs that do not
/// contain it cannot be resolved.
pub fn media_key_from_url(url: &str) -> Option<String> {
    let marker = format!("/{}/", Bucket::EventMedia.name());
    let (_, key) = strip_query(url).split_once(&marker)?;
    (!key.is_empty()).then(|| key.to_string())
}

/// Content type served for an object, guessed from its extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "svg" => "image/svg+xml",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_falls_back() {
        assert_eq!(extension("Contract.PDF"), "pdf");
        assert_eq!(extension("archive.tar.gz"), "gz");
        assert_eq!(extension("README"), "bin");
        assert_eq!(extension("weird.p/df"), "bin");
        assert_eq!(extension("trailing."), "bin");
    }

    #[test]
    fn key_layouts() {
        let event = Uuid::nil();
        assert_eq!(
            document_key(event, DocumentSlot::RunOfShow, 1700000000000, "pdf"),
            "00000000-0000-0000-0000-000000000000/run_of_show-1700000000000.pdf"
        );
        assert_eq!(
            media_key(event, MediaType::Video, 5, "mov"),
            "00000000-0000-0000-0000-000000000000/video-5.mov"
        );
        let a = avatar_key(event, "png");
        let b = avatar_key(event, "png");
        assert!(a.starts_with("00000000-0000-0000-0000-000000000000-"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_document_urls_resolve_by_last_segment() {
        let event = Uuid::new_v4();
        let url = format!("https://cdn.example.com/storage/v1/object/public/event-documents/{event}/invoice-9.pdf?token=x");
        assert_eq!(
            document_key_from_url(event, &url),
            Some(format!("{event}/invoice-9.pdf"))
        );
        assert_eq!(document_key_from_url(event, "https://cdn.example.com/"), None);
    }

    #[test]
    fn legacy_media_urls_need_the_bucket_marker() {
        assert_eq!(
            media_key_from_url("https://h/storage/event-media/ev/image-1.jpg"),
            Some("ev/image-1.jpg".to_string())
        );
        assert_eq!(media_key_from_url("https://h/other/ev/image-1.jpg"), None);
        assert_eq!(media_key_from_url("https://h/storage/event-media/"), None);
    }
}
