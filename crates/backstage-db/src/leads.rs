use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use backstage_types::api::LeadRequest;
use backstage_types::models::{Lead, LeadStatus};

use crate::Database;
use crate::convert::{self, OptionalExt, format_timestamp};

const LEAD_COLUMNS: &str = "id, school, fraternity, contact_phone, contact_email, instagram_handle, \
     contact_name, status, notes, created_by, created_at, updated_at";

const INSERT_LEAD: &str = "INSERT INTO leads
    (id, school, fraternity, contact_phone, contact_email, instagram_handle, contact_name,
     status, notes, created_by, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

impl Database {
    pub fn insert_lead(&self, lead: &Lead) -> Result<()> {
        self.with_conn(|conn| insert(conn, lead))
    }

    /// Insert all rows in one transaction: either every lead lands or none.
    pub fn insert_leads(&self, leads: &[Lead]) -> Result<usize> {
        if leads.is_empty() {
            return Ok(0);
        }
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for lead in leads {
                insert(&tx, lead)?;
            }
            tx.commit()?;
            Ok(leads.len())
        })
    }

    pub fn get_lead(&self, id: Uuid) -> Result<Option<Lead>> {
        self.with_conn(|conn| query_lead(conn, id))
    }

    /// Newest first.
    pub fn list_leads(&self) -> Result<Vec<Lead>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], lead_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_lead(&self, id: Uuid, req: &LeadRequest, now: DateTime<Utc>) -> Result<Option<Lead>> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE leads
                 SET school = ?2, fraternity = ?3, contact_phone = ?4, instagram_handle = ?5,
                     contact_name = ?6, status = ?7, notes = ?8, updated_at = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    req.school,
                    req.fraternity,
                    req.contact_phone,
                    req.instagram_handle,
                    req.contact_name,
                    req.status.as_str(),
                    req.notes,
                    format_timestamp(now),
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_lead(conn, id)
        })
    }

    pub fn update_lead_status(
        &self,
        id: Uuid,
        status: LeadStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Lead>> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE leads SET status = ?2, updated_at = ?3 WHERE id = ?1",
                (id.to_string(), status.as_str(), format_timestamp(now)),
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_lead(conn, id)
        })
    }

    pub fn delete_lead(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM leads WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }
}

fn insert(conn: &Connection, lead: &Lead) -> Result<()> {
    conn.execute(
        INSERT_LEAD,
        rusqlite::params![
            lead.id.to_string(),
            lead.school,
            lead.fraternity,
            lead.contact_phone,
            lead.contact_email,
            lead.instagram_handle,
            lead.contact_name,
            lead.status,
            lead.notes,
            lead.created_by.to_string(),
            format_timestamp(lead.created_at),
            format_timestamp(lead.updated_at),
        ],
    )?;
    Ok(())
}

fn query_lead(conn: &Connection, id: Uuid) -> Result<Option<Lead>> {
    conn.query_row(
        &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
        [id.to_string()],
        lead_from_row,
    )
    .optional()
}

fn lead_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: convert::uuid(row, 0)?,
        school: row.get(1)?,
        fraternity: row.get(2)?,
        contact_phone: row.get(3)?,
        contact_email: row.get(4)?,
        instagram_handle: row.get(5)?,
        contact_name: row.get(6)?,
        status: row.get(7)?,
        notes: row.get(8)?,
        created_by: convert::uuid(row, 9)?,
        created_at: convert::timestamp(row, 10)?,
        updated_at: convert::timestamp(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(created_by: Uuid, school: &str) -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::new_v4(),
            school: school.into(),
            fraternity: "Sigma Chi".into(),
            contact_phone: "+15550001111".into(),
            contact_email: None,
            instagram_handle: None,
            contact_name: None,
            status: LeadStatus::Contacted.as_str().into(),
            notes: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let admin = Uuid::new_v4();
        db.create_user(admin, "admin@example.com", "hash", Utc::now()).unwrap();
        (db, admin)
    }

    #[test]
    fn batch_insert_is_all_or_nothing() {
        let (db, admin) = setup();
        let good = lead(admin, "A");
        // unknown creator violates the foreign key
        let bad = lead(Uuid::new_v4(), "B");
        assert!(db.insert_leads(&[good.clone(), bad]).is_err());
        assert!(db.list_leads().unwrap().is_empty());

        assert_eq!(db.insert_leads(&[good, lead(admin, "C")]).unwrap(), 2);
        assert_eq!(db.list_leads().unwrap().len(), 2);
        assert_eq!(db.insert_leads(&[]).unwrap(), 0);
    }

    #[test]
    fn status_update_touches_only_status() {
        let (db, admin) = setup();
        let original = lead(admin, "State");
        db.insert_lead(&original).unwrap();

        let updated = db
            .update_lead_status(original.id, LeadStatus::Declined, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, "declined");
        assert_eq!(updated.school, "State");
        assert!(db.update_lead_status(Uuid::new_v4(), LeadStatus::Declined, Utc::now()).unwrap().is_none());

        assert!(db.delete_lead(original.id).unwrap());
        assert!(db.get_lead(original.id).unwrap().is_none());
    }
}
