//! Read-only aggregates behind the administrative functions.

use anyhow::Result;
use uuid::Uuid;

use backstage_types::api::{ChapterSummary, UserSummary};

use crate::Database;
use crate::convert;
use crate::models::ChapterEventStats;

impl Database {
    /// One row per account with its event figures. `chapter` narrows the
    /// result to members of that chapter.
    pub fn user_summaries(&self, chapter: Option<Uuid>) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.email, p.school, p.fraternity, p.role, p.chapter_id, c.name,
                        COUNT(e.id),
                        COALESCE(AVG(e.budget), 0),
                        COALESCE(SUM(CASE WHEN e.signed_contract_url IS NOT NULL THEN 1 ELSE 0 END), 0),
                        MAX(e.event_date),
                        u.created_at
                 FROM users u
                 JOIN profiles p ON p.id = u.id
                 LEFT JOIN chapters c ON c.id = p.chapter_id
                 LEFT JOIN events e ON e.owner_id = u.id
                 WHERE ?1 IS NULL OR p.chapter_id = ?1
                 GROUP BY u.id
                 ORDER BY u.created_at DESC",
            )?;
            let rows = stmt
                .query_map([chapter.map(|c| c.to_string())], |row| {
                    Ok(UserSummary {
                        user_id: convert::uuid(row, 0)?,
                        email: row.get(1)?,
                        school: row.get(2)?,
                        fraternity: row.get(3)?,
                        role: convert::parsed(row, 4)?,
                        chapter_id: convert::uuid_opt(row, 5)?,
                        chapter_name: row.get(6)?,
                        total_events: row.get::<_, i64>(7)? as u64,
                        average_budget: row.get(8)?,
                        signed_contracts: row.get::<_, i64>(9)? as u64,
                        last_event_date: convert::date_opt(row, 10)?,
                        created_at: convert::timestamp(row, 11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every chapter with its current member count, alphabetical.
    pub fn list_chapter_summaries(&self) -> Result<Vec<ChapterSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, COUNT(p.id), c.created_at
                 FROM chapters c
                 LEFT JOIN profiles p ON p.chapter_id = c.id
                 GROUP BY c.id
                 ORDER BY c.name",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ChapterSummary {
                        id: convert::uuid(row, 0)?,
                        name: row.get(1)?,
                        member_count: row.get::<_, i64>(2)? as u64,
                        created_at: convert::timestamp(row, 3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_chapter_members(&self, chapter_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM profiles WHERE chapter_id = ?1",
                [chapter_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Totals over the events attributed to a chapter. A chapter without
    /// events yields all zeros rather than NULL averages.
    pub fn chapter_event_stats(&self, chapter_id: Uuid) -> Result<ChapterEventStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(AVG(budget), 0),
                        COALESCE(SUM(budget), 0),
                        COALESCE(SUM(CASE WHEN signed_contract_url IS NOT NULL THEN 1 ELSE 0 END), 0)
                 FROM events WHERE chapter_id = ?1",
                [chapter_id.to_string()],
                |row| {
                    Ok(ChapterEventStats {
                        total_events: row.get::<_, i64>(0)? as u64,
                        average_budget: row.get(1)?,
                        total_budget: row.get(2)?,
                        signed_contracts: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}
