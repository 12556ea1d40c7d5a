use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;

use super::{SqliteGateway, StoreError, UpsertGateway, from_stored, side, to_stored};
use crate::core::model::{CanonicalUpdate, Event, EventDetail, EventStatus};

const EVENT_COLUMNS: &str = "id, external_id, status, home_team_id, away_team_id, home_score, away_score,
     period, clock, start_time, end_time, created_at, updated_at";

/// Status is merged with MAX over its rank; everything else is
/// coalesce(new, existing). Clock and period are frozen once the stored row
/// is completed, and a stored end time is never replaced.
const UPSERT_EVENT: &str = "INSERT INTO events (
        external_id, status, home_team_id, away_team_id, home_score, away_score,
        period, clock, start_time, end_time, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
    ON CONFLICT(external_id) DO UPDATE SET
        status = MAX(events.status, excluded.status),
        home_team_id = COALESCE(excluded.home_team_id, events.home_team_id),
        away_team_id = COALESCE(excluded.away_team_id, events.away_team_id),
        home_score = COALESCE(excluded.home_score, events.home_score),
        away_score = COALESCE(excluded.away_score, events.away_score),
        period = CASE WHEN events.status = 2 THEN events.period
                      ELSE COALESCE(excluded.period, events.period) END,
        clock = CASE WHEN events.status = 2 THEN events.clock
                     ELSE COALESCE(excluded.clock, events.clock) END,
        start_time = COALESCE(excluded.start_time, events.start_time),
        end_time = COALESCE(events.end_time, excluded.end_time),
        updated_at = MAX(events.updated_at, excluded.updated_at)";

/// Row as read from sqlite, before timestamp and status decoding.
struct RawEvent {
    id: i64,
    external_id: String,
    status: i64,
    home_team_id: Option<String>,
    away_team_id: Option<String>,
    home_score: Option<i64>,
    away_score: Option<i64>,
    period: Option<i64>,
    clock: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            external_id: row.get(1)?,
            status: row.get(2)?,
            home_team_id: row.get(3)?,
            away_team_id: row.get(4)?,
            home_score: row.get(5)?,
            away_score: row.get(6)?,
            period: row.get(7)?,
            clock: row.get(8)?,
            start_time: row.get(9)?,
            end_time: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn decode(self) -> Result<Event, StoreError> {
        let status = EventStatus::from_rank(self.status).ok_or_else(|| StoreError::Corrupt {
            column: "status",
            value: self.status.to_string(),
        })?;
        Ok(Event {
            id: self.id,
            external_id: self.external_id,
            status,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            home_score: self.home_score,
            away_score: self.away_score,
            period: self.period,
            clock: self.clock,
            start_time: from_stored("start_time", self.start_time)?,
            end_time: from_stored("end_time", self.end_time)?,
            created_at: required_stored("created_at", self.created_at)?,
            updated_at: required_stored("updated_at", self.updated_at)?,
        })
    }
}

fn required_stored(column: &'static str, value: String) -> Result<DateTime<Utc>, StoreError> {
    match from_stored(column, Some(value))? {
        Some(ts) => Ok(ts),
        None => Err(StoreError::Corrupt {
            column,
            value: String::new(),
        }),
    }
}

pub(super) fn load_event(conn: &Connection, external_id: &str) -> Result<Option<Event>, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE external_id = ?1"),
            params![external_id],
            RawEvent::from_row,
        )
        .optional()?;
    raw.map(RawEvent::decode).transpose()
}

/// Apply one update inside the caller's transaction.
fn upsert_in(conn: &Connection, update: &CanonicalUpdate) -> Result<Event, StoreError> {
    let status = update.status.unwrap_or(EventStatus::Scheduled);
    // A completed event always carries an end time; the observation instant
    // stands in when no source reported one.
    let end_time = status
        .is_terminal()
        .then(|| update.end_time.unwrap_or(update.observed_at));

    conn.execute(
        UPSERT_EVENT,
        params![
            update.external_id,
            status.rank(),
            update.home_team_id,
            update.away_team_id,
            update.home_score,
            update.away_score,
            update.period,
            update.clock,
            update.start_time.as_ref().map(to_stored),
            end_time.as_ref().map(to_stored),
            to_stored(&update.observed_at),
        ],
    )?;

    let event = load_event(conn, &update.external_id)?
        .ok_or_else(|| StoreError::Missing(update.external_id.clone()))?;

    if let Some(arena) = &update.arena {
        side::upsert_arena(conn, event.id, arena)?;
    }
    for official in &update.officials {
        side::upsert_official(conn, event.id, official)?;
    }
    for stats in &update.team_stats {
        side::upsert_team_stats(conn, event.id, stats)?;
    }
    Ok(event)
}

#[async_trait]
impl UpsertGateway for SqliteGateway {
    async fn upsert_batch(&self, updates: &[CanonicalUpdate]) -> Result<Vec<Event>, StoreError> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let mut stored = Vec::with_capacity(updates.len());
        for update in updates {
            stored.push(upsert_in(&tx, update)?);
        }
        tx.commit()?;
        Ok(stored)
    }

    async fn find_event(&self, external_id: &str) -> Result<Option<Event>, StoreError> {
        let db = self.db.lock().await;
        load_event(&db, external_id)
    }

    async fn completed_among(
        &self,
        external_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT 1 FROM events WHERE external_id = ?1 AND status = 2")?;
        let mut completed = HashSet::new();
        for id in external_ids {
            if stmt.exists(params![id])? {
                completed.insert(id.clone());
            }
        }
        Ok(completed)
    }
}

impl SqliteGateway {
    /// Event row plus arena, officials and team stats.
    pub async fn find_detail(&self, external_id: &str) -> Result<Option<EventDetail>, StoreError> {
        let db = self.db.lock().await;
        let Some(event) = load_event(&db, external_id)? else {
            return Ok(None);
        };
        Ok(Some(EventDetail {
            arena: side::load_arena(&db, event.id)?,
            officials: side::load_officials(&db, event.id)?,
            team_stats: side::load_team_stats(&db, event.id)?,
            event,
        }))
    }

    /// Most recently updated events first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<Event>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY updated_at DESC, id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], RawEvent::from_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?.decode()?);
        }
        Ok(results)
    }
}
