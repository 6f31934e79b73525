use anyhow::Result;
use uuid::Uuid;

use backstage_types::models::MediaItem;

use crate::Database;
use crate::convert::{self, OptionalExt, format_timestamp};

const MEDIA_COLUMNS: &str = "id, event_id, url, object_key, media_type, uploaded_by, created_at";

impl Database {
    pub fn insert_media(&self, item: &MediaItem) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO media (id, event_id, url, object_key, media_type, uploaded_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    item.id.to_string(),
                    item.event_id.to_string(),
                    item.url,
                    item.key,
                    item.media_type.as_str(),
                    item.uploaded_by.to_string(),
                    format_timestamp(item.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_media(&self, id: Uuid) -> Result<Option<MediaItem>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = ?1"),
                [id.to_string()],
                media_from_row,
            )
            .optional()
        })
    }

    /// Newest first.
    pub fn list_media(&self, event_id: Uuid) -> Result<Vec<MediaItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEDIA_COLUMNS} FROM media WHERE event_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([event_id.to_string()], media_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_media(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM media WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }
}

fn media_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaItem> {
    Ok(MediaItem {
        id: convert::uuid(row, 0)?,
        event_id: convert::uuid(row, 1)?,
        url: row.get(2)?,
        key: row.get(3)?,
        media_type: convert::parsed(row, 4)?,
        uploaded_by: convert::uuid(row, 5)?,
        created_at: convert::timestamp(row, 6)?,
    })
}
