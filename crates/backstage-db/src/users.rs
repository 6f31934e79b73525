use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use backstage_types::models::{Chapter, Profile, Role};

use crate::Database;
use crate::convert::{self, OptionalExt, format_timestamp};
use crate::models::UserRow;

const PROFILE_COLUMNS: &str = "id, school, fraternity, avatar_url, role, chapter_id";

impl Database {
    // -- Users --

    /// Insert an identity together with its (client) profile.
    pub fn create_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id.to_string(), email, password_hash, format_timestamp(now)),
            )?;
            tx.execute("INSERT INTO profiles (id) VALUES (?1)", [id.to_string()])?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))
    }

    // -- Profiles --

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
                [id.to_string()],
                profile_from_row,
            )
            .optional()
        })
    }

    /// The server-side admin check. Unknown identities are never admins.
    pub fn is_admin(&self, id: Uuid) -> Result<bool> {
        let role = self.with_conn(|conn| {
            conn.query_row(
                "SELECT role FROM profiles WHERE id = ?1",
                [id.to_string()],
                |row| convert::parsed::<Role>(row, 0),
            )
            .optional()
        })?;
        Ok(role.is_some_and(Role::is_admin))
    }

    pub fn update_profile(
        &self,
        id: Uuid,
        school: Option<&str>,
        fraternity: Option<&str>,
    ) -> Result<Option<Profile>> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE profiles SET school = ?2, fraternity = ?3 WHERE id = ?1",
                (id.to_string(), school, fraternity),
            )?)
        })?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_profile(id)
    }

    /// Point the profile at a new avatar object. Returns the key of the
    /// avatar it replaced, if any, so the caller can remove that object.
    pub fn set_avatar(&self, id: Uuid, url: &str, key: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let previous: Option<String> = tx
                .query_row(
                    "SELECT avatar_key FROM profiles WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            tx.execute(
                "UPDATE profiles SET avatar_url = ?2, avatar_key = ?3 WHERE id = ?1",
                (id.to_string(), url, key),
            )?;
            tx.commit()?;
            Ok(previous)
        })
    }

    /// Returns false when no such profile exists.
    pub fn set_role(&self, id: Uuid, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE profiles SET role = ?2 WHERE id = ?1",
                (id.to_string(), role.as_str()),
            )?;
            Ok(n > 0)
        })
    }

    /// Returns false when no such profile exists.
    pub fn set_chapter(&self, id: Uuid, chapter_id: Option<Uuid>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE profiles SET chapter_id = ?2 WHERE id = ?1",
                (id.to_string(), chapter_id.map(|c| c.to_string())),
            )?;
            Ok(n > 0)
        })
    }

    /// Promote every listed email that has an account. Returns how many
    /// profiles now carry the admin role because of this call.
    pub fn promote_admins(&self, emails: &[String]) -> Result<usize> {
        self.with_conn(|conn| {
            let mut promoted = 0;
            for email in emails {
                promoted += conn.execute(
                    "UPDATE profiles SET role = 'admin'
                     WHERE role != 'admin'
                       AND id = (SELECT id FROM users WHERE email = ?1)",
                    [email],
                )?;
            }
            Ok(promoted)
        })
    }

    // -- Chapters --

    pub fn create_chapter(&self, chapter: &Chapter) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chapters (id, name, created_at) VALUES (?1, ?2, ?3)",
                (
                    chapter.id.to_string(),
                    &chapter.name,
                    format_timestamp(chapter.created_at),
                ),
            )?;
            Ok(())
        })
    }

    pub fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>> {
        self.with_conn(|conn| query_chapter(conn, "id = ?1", &id.to_string()))
    }

    pub fn get_chapter_by_name(&self, name: &str) -> Result<Option<Chapter>> {
        self.with_conn(|conn| query_chapter(conn, "name = ?1", name))
    }
}

fn query_chapter(conn: &Connection, predicate: &str, value: &str) -> Result<Option<Chapter>> {
    conn.query_row(
        &format!("SELECT id, name, created_at FROM chapters WHERE {predicate}"),
        [value],
        |row| {
            Ok(Chapter {
                id: convert::uuid(row, 0)?,
                name: row.get(1)?,
                created_at: convert::timestamp(row, 2)?,
            })
        },
    )
    .optional()
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, email, password, created_at FROM users WHERE {predicate}"
    ))?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: convert::uuid(row, 0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            created_at: convert::timestamp(row, 3)?,
        })
    })
    .optional()
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: convert::uuid(row, 0)?,
        school: row.get(1)?,
        fraternity: row.get(2)?,
        avatar_url: row.get(3)?,
        role: convert::parsed(row, 4)?,
        chapter_id: convert::uuid_opt(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user(email: &str) -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_user(id, email, "$argon2id$stub", Utc::now()).unwrap();
        (db, id)
    }

    #[test]
    fn new_users_get_a_client_profile() {
        let (db, id) = db_with_user("client@example.com");
        let profile = db.get_profile(id).unwrap().unwrap();
        assert_eq!(profile.role, Role::Client);
        assert!(!db.is_admin(id).unwrap());
        assert!(!db.is_admin(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn duplicate_email_is_a_constraint_violation() {
        let (db, _) = db_with_user("planner@example.com");
        let err = db
            .create_user(Uuid::new_v4(), "PLANNER@example.com", "$argon2id$stub", Utc::now())
            .unwrap_err();
        assert!(crate::is_constraint_violation(&err));
        assert!(!crate::is_constraint_violation(&anyhow::anyhow!("disk full")));
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let (db, id) = db_with_user("Planner@Example.com");
        let row = db.get_user_by_email("planner@example.com").unwrap().unwrap();
        assert_eq!(row.id, id);
    }

    #[test]
    fn promote_and_set_role() {
        let (db, id) = db_with_user("boss@example.com");
        assert_eq!(db.promote_admins(&["boss@example.com".into()]).unwrap(), 1);
        assert!(db.is_admin(id).unwrap());
        // already admin: nothing new to promote
        assert_eq!(db.promote_admins(&["boss@example.com".into()]).unwrap(), 0);

        assert!(db.set_role(id, Role::Client).unwrap());
        assert!(!db.is_admin(id).unwrap());
        assert!(!db.set_role(Uuid::new_v4(), Role::Admin).unwrap());
    }

    #[test]
    fn avatar_replacement_returns_previous_key() {
        let (db, id) = db_with_user("pics@example.com");
        assert_eq!(db.set_avatar(id, "http://x/a1", "a1.png").unwrap(), None);
        assert_eq!(
            db.set_avatar(id, "http://x/a2", "a2.png").unwrap().as_deref(),
            Some("a1.png")
        );
        let profile = db.get_profile(id).unwrap().unwrap();
        assert_eq!(profile.avatar_url.as_deref(), Some("http://x/a2"));
    }

    #[test]
    fn chapter_assignment() {
        let (db, id) = db_with_user("member@example.com");
        let chapter = Chapter {
            id: Uuid::new_v4(),
            name: "Alpha".into(),
            created_at: Utc::now(),
        };
        db.create_chapter(&chapter).unwrap();
        assert_eq!(db.get_chapter_by_name("Alpha").unwrap().map(|c| c.id), Some(chapter.id));
        assert!(db.set_chapter(id, Some(chapter.id)).unwrap());
        assert_eq!(db.get_profile(id).unwrap().unwrap().chapter_id, Some(chapter.id));
        assert!(db.set_chapter(id, None).unwrap());
        assert_eq!(db.get_profile(id).unwrap().unwrap().chapter_id, None);
    }
}
