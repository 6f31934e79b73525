use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use backstage_types::api::{AdminEventListing, EventRequest};
use backstage_types::models::{DocumentRef, DocumentSet, DocumentSlot, Event, actor_label};

use crate::Database;
use crate::convert::{self, OptionalExt, format_date, format_timestamp};

pub(crate) const EVENT_COLUMNS: &str = "e.id, e.owner_id, e.chapter_id, e.name, e.event_date, \
     e.artist_name, e.budget, e.phone, \
     e.invoice_url, e.invoice_key, e.contract_url, e.contract_key, \
     e.renders_url, e.renders_key, e.production_schedule_url, e.production_schedule_key, \
     e.run_of_show_url, e.run_of_show_key, e.signed_contract_url, e.signed_contract_key, \
     e.created_at, e.updated_at";

/// Index of the first slot column in [`EVENT_COLUMNS`]; slots follow in
/// `DocumentSlot::ALL` order as (url, key) pairs.
const FIRST_SLOT_COLUMN: usize = 8;
const CREATED_AT_COLUMN: usize = FIRST_SLOT_COLUMN + 2 * DocumentSlot::ALL.len();

fn slot_columns(slot: DocumentSlot) -> (&'static str, &'static str) {
    match slot {
        DocumentSlot::Invoice => ("invoice_url", "invoice_key"),
        DocumentSlot::Contract => ("contract_url", "contract_key"),
        DocumentSlot::Renders => ("renders_url", "renders_key"),
        DocumentSlot::ProductionSchedule => ("production_schedule_url", "production_schedule_key"),
        DocumentSlot::RunOfShow => ("run_of_show_url", "run_of_show_key"),
        DocumentSlot::SignedContract => ("signed_contract_url", "signed_contract_key"),
    }
}

/// A before/after pair for one updated row.
pub type EventUpdate = (Event, Event);

impl Database {
    pub fn insert_event(&self, event: &Event) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events
                    (id, owner_id, chapter_id, name, event_date, artist_name, budget, phone,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    event.id.to_string(),
                    event.owner_id.to_string(),
                    event.chapter_id.map(|c| c.to_string()),
                    event.name,
                    format_date(event.date),
                    event.artist_name,
                    event.budget,
                    event.phone,
                    format_timestamp(event.created_at),
                    format_timestamp(event.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
        self.with_conn(|conn| query_event(conn, id))
    }

    pub fn list_events_for_owner(&self, owner_id: Uuid) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events e
                 WHERE e.owner_id = ?1
                 ORDER BY e.event_date, e.created_at"
            ))?;
            let rows = stmt
                .query_map([owner_id.to_string()], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every event, optionally restricted to an inclusive date window,
    /// labelled with its owner's school and fraternity.
    pub fn list_all_events(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<AdminEventListing>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS}, p.school, p.fraternity
                 FROM events e
                 LEFT JOIN profiles p ON p.id = e.owner_id
                 WHERE (?1 IS NULL OR e.event_date >= ?1)
                   AND (?2 IS NULL OR e.event_date <= ?2)
                 ORDER BY e.event_date, e.created_at"
            ))?;
            let rows = stmt
                .query_map((from.map(format_date), to.map(format_date)), |row| {
                    let event = event_from_row(row)?;
                    let school: Option<String> = row.get(CREATED_AT_COLUMN + 2)?;
                    let fraternity: Option<String> = row.get(CREATED_AT_COLUMN + 3)?;
                    Ok(AdminEventListing {
                        event,
                        owner_label: actor_label(school.as_deref(), fraternity.as_deref()),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Overwrite the editable fields of an event.
    ///
    /// With `owner_id` set, the write matches on id *and* owner in the same
    /// statement; `None` is the admin path with no owner filter. Returns
    /// `None` when nothing matched.
    pub fn update_event_fields(
        &self,
        id: Uuid,
        owner_id: Option<Uuid>,
        fields: &EventRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<EventUpdate>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(old) = query_event(&tx, id)? else {
                return Ok(None);
            };

            let changed = tx.execute(
                "UPDATE events
                 SET name = ?3, event_date = ?4, artist_name = ?5, budget = ?6, phone = ?7,
                     updated_at = ?8
                 WHERE id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                rusqlite::params![
                    id.to_string(),
                    owner_id.map(|o| o.to_string()),
                    fields.name,
                    format_date(fields.date),
                    fields.artist_name,
                    fields.budget,
                    fields.phone,
                    format_timestamp(now),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            let new = query_event(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("event {} vanished mid-update", id))?;
            tx.commit()?;
            Ok(Some((old, new)))
        })
    }

    /// Set or clear one document slot.
    pub fn set_event_document(
        &self,
        id: Uuid,
        slot: DocumentSlot,
        document: Option<&DocumentRef>,
        now: DateTime<Utc>,
    ) -> Result<Option<EventUpdate>> {
        let (url_col, key_col) = slot_columns(slot);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(old) = query_event(&tx, id)? else {
                return Ok(None);
            };

            tx.execute(
                &format!(
                    "UPDATE events SET {url_col} = ?2, {key_col} = ?3, updated_at = ?4 WHERE id = ?1"
                ),
                rusqlite::params![
                    id.to_string(),
                    document.map(|d| d.url.as_str()),
                    document.and_then(|d| d.key.as_deref()),
                    format_timestamp(now),
                ],
            )?;

            let new = query_event(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("event {} vanished mid-update", id))?;
            tx.commit()?;
            Ok(Some((old, new)))
        })
    }
}

fn query_event(conn: &Connection, id: Uuid) -> Result<Option<Event>> {
    conn.query_row(
        &format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = ?1"),
        [id.to_string()],
        event_from_row,
    )
    .optional()
}

pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let mut documents = DocumentSet::default();
    for (i, slot) in DocumentSlot::ALL.into_iter().enumerate() {
        let url: Option<String> = row.get(FIRST_SLOT_COLUMN + 2 * i)?;
        let key: Option<String> = row.get(FIRST_SLOT_COLUMN + 2 * i + 1)?;
        *documents.slot_mut(slot) = url.map(|url| DocumentRef { url, key });
    }

    Ok(Event {
        id: convert::uuid(row, 0)?,
        owner_id: convert::uuid(row, 1)?,
        chapter_id: convert::uuid_opt(row, 2)?,
        name: row.get(3)?,
        date: convert::date(row, 4)?,
        artist_name: row.get(5)?,
        budget: row.get(6)?,
        phone: row.get(7)?,
        documents,
        created_at: convert::timestamp(row, CREATED_AT_COLUMN)?,
        updated_at: convert::timestamp(row, CREATED_AT_COLUMN + 1)?,
    })
}
