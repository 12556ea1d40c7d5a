mod events;
mod side;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::model::{CanonicalUpdate, Event};
use crate::platform::{NativePlatform, Platform};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt stored value in {column}: {value}")]
    Corrupt { column: &'static str, value: String },

    #[error("event {0} missing after write")]
    Missing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Idempotent persistence of canonical updates, keyed on external id.
///
/// Every field is written as `coalesce(new, existing)`. Status only moves
/// forward, and once an event is completed its status, end time, clock and
/// period never change again. A batch commits as a whole or not at all.
#[async_trait]
pub trait UpsertGateway: Send + Sync {
    async fn upsert_batch(&self, updates: &[CanonicalUpdate]) -> Result<Vec<Event>, StoreError>;

    async fn upsert(&self, update: &CanonicalUpdate) -> Result<Event, StoreError> {
        let mut stored = self.upsert_batch(std::slice::from_ref(update)).await?;
        stored
            .pop()
            .ok_or_else(|| StoreError::Missing(update.external_id.clone()))
    }

    async fn find_event(&self, external_id: &str) -> Result<Option<Event>, StoreError>;

    /// The subset of `external_ids` already stored as completed.
    async fn completed_among(&self, external_ids: &[String])
    -> Result<HashSet<String>, StoreError>;
}

pub struct SqliteGateway {
    db: Arc<Mutex<Connection>>,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL UNIQUE CHECK (length(external_id) > 0),
        status INTEGER NOT NULL DEFAULT 0 CHECK (status BETWEEN 0 AND 2),
        home_team_id TEXT,
        away_team_id TEXT,
        home_score INTEGER,
        away_score INTEGER,
        period INTEGER,
        clock TEXT,
        start_time TEXT,
        end_time TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK ((status = 2) = (end_time IS NOT NULL))
    )",
    "CREATE TABLE IF NOT EXISTS arenas (
        event_id INTEGER PRIMARY KEY REFERENCES events(id),
        arena_id TEXT,
        name TEXT,
        city TEXT,
        state TEXT
    )",
    "CREATE TABLE IF NOT EXISTS officials (
        event_id INTEGER NOT NULL REFERENCES events(id),
        person_id TEXT NOT NULL,
        name TEXT,
        jersey_num TEXT,
        assignment TEXT,
        PRIMARY KEY (event_id, person_id)
    )",
    "CREATE TABLE IF NOT EXISTS team_stats (
        event_id INTEGER NOT NULL REFERENCES events(id),
        team_id TEXT NOT NULL,
        side TEXT NOT NULL,
        points INTEGER,
        field_goals_made INTEGER,
        field_goals_attempted INTEGER,
        three_pointers_made INTEGER,
        three_pointers_attempted INTEGER,
        free_throws_made INTEGER,
        free_throws_attempted INTEGER,
        rebounds INTEGER,
        assists INTEGER,
        steals INTEGER,
        blocks INTEGER,
        turnovers INTEGER,
        fouls INTEGER,
        PRIMARY KEY (event_id, team_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_events_status ON events(status)",
];

impl SqliteGateway {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = Connection::open(db_path)?;
        NativePlatform::restrict_file_permissions(db_path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        for statement in SCHEMA {
            conn.execute(statement, [])?;
        }
        info!("Event store ready");
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so that string
/// order is time order.
pub(crate) fn to_stored(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn from_stored(
    column: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| StoreError::Corrupt { column, value: raw })
        })
        .transpose()
}
