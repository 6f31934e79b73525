use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE chapters (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE profiles (
                id          TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                school      TEXT,
                fraternity  TEXT,
                avatar_url  TEXT,
                avatar_key  TEXT,
                role        TEXT NOT NULL DEFAULT 'client' CHECK (role IN ('client', 'admin')),
                chapter_id  TEXT REFERENCES chapters(id) ON DELETE SET NULL
            );

            CREATE INDEX idx_profiles_chapter ON profiles(chapter_id);

            CREATE TABLE events (
                id                       TEXT PRIMARY KEY,
                owner_id                 TEXT NOT NULL REFERENCES users(id),
                chapter_id               TEXT REFERENCES chapters(id) ON DELETE SET NULL,
                name                     TEXT,
                event_date               TEXT NOT NULL,
                artist_name              TEXT,
                budget                   REAL NOT NULL CHECK (budget >= 0),
                phone                    TEXT NOT NULL,
                invoice_url              TEXT,
                invoice_key              TEXT,
                contract_url             TEXT,
                contract_key             TEXT,
                renders_url              TEXT,
                renders_key              TEXT,
                production_schedule_url  TEXT,
                production_schedule_key  TEXT,
                run_of_show_url          TEXT,
                run_of_show_key          TEXT,
                signed_contract_url      TEXT,
                signed_contract_key      TEXT,
                created_at               TEXT NOT NULL,
                updated_at               TEXT NOT NULL
            );

            CREATE INDEX idx_events_owner ON events(owner_id, event_date);
            CREATE INDEX idx_events_chapter ON events(chapter_id);

            CREATE TABLE media (
                id          TEXT PRIMARY KEY,
                event_id    TEXT NOT NULL REFERENCES events(id),
                url         TEXT NOT NULL,
                object_key  TEXT,
                media_type  TEXT NOT NULL CHECK (media_type IN ('image', 'video', 'other')),
                uploaded_by TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_media_event ON media(event_id, created_at);

            -- contact_email is only written by the CSV import; the lead
            -- screens work with contact_phone / instagram_handle.
            CREATE TABLE leads (
                id                TEXT PRIMARY KEY,
                school            TEXT NOT NULL,
                fraternity        TEXT NOT NULL,
                contact_phone     TEXT NOT NULL DEFAULT '',
                contact_email     TEXT,
                instagram_handle  TEXT,
                contact_name      TEXT,
                status            TEXT NOT NULL,
                notes             TEXT,
                created_by        TEXT NOT NULL REFERENCES users(id),
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
