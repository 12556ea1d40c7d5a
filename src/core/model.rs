use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked event. Ordering follows the only legal
/// direction of travel, so `max` of two statuses is the monotonic merge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    InProgress,
    Completed,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::InProgress => "in_progress",
            EventStatus::Completed => "completed",
        }
    }

    /// Integer rank used as the stored column value.
    pub fn rank(self) -> i64 {
        match self {
            EventStatus::Scheduled => 0,
            EventStatus::InProgress => 1,
            EventStatus::Completed => 2,
        }
    }

    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            0 => Some(EventStatus::Scheduled),
            1 => Some(EventStatus::InProgress),
            2 => Some(EventStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == EventStatus::Completed
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    pub fn as_str(self) -> &'static str {
        match self {
            TeamSide::Home => "home",
            TeamSide::Away => "away",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "home" => Some(TeamSide::Home),
            "away" => Some(TeamSide::Away),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArenaUpdate {
    pub arena_id: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfficialUpdate {
    pub person_id: String,
    pub name: Option<String>,
    pub jersey_num: Option<String>,
    pub assignment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeamStatsLine {
    pub points: Option<i64>,
    pub field_goals_made: Option<i64>,
    pub field_goals_attempted: Option<i64>,
    pub three_pointers_made: Option<i64>,
    pub three_pointers_attempted: Option<i64>,
    pub free_throws_made: Option<i64>,
    pub free_throws_attempted: Option<i64>,
    pub rebounds: Option<i64>,
    pub assists: Option<i64>,
    pub steals: Option<i64>,
    pub blocks: Option<i64>,
    pub turnovers: Option<i64>,
    pub fouls: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamStatsUpdate {
    pub team_id: String,
    pub side: TeamSide,
    pub line: TeamStatsLine,
}

/// The reconciled record for one event at one observation instant.
///
/// Every field is optional: `None` means "no source reported it" and never
/// overwrites a stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalUpdate {
    pub external_id: String,
    pub observed_at: DateTime<Utc>,
    pub status: Option<EventStatus>,
    pub home_team_id: Option<String>,
    pub away_team_id: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub period: Option<i64>,
    pub clock: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub arena: Option<ArenaUpdate>,
    pub officials: Vec<OfficialUpdate>,
    pub team_stats: Vec<TeamStatsUpdate>,
}

impl CanonicalUpdate {
    /// An update that carries nothing but the key and observation time.
    pub fn empty(external_id: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            external_id: external_id.into(),
            observed_at,
            status: None,
            home_team_id: None,
            away_team_id: None,
            home_score: None,
            away_score: None,
            period: None,
            clock: None,
            start_time: None,
            end_time: None,
            arena: None,
            officials: Vec::new(),
            team_stats: Vec::new(),
        }
    }
}

/// A persisted event row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: i64,
    pub external_id: String,
    pub status: EventStatus,
    pub home_team_id: Option<String>,
    pub away_team_id: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub period: Option<i64>,
    pub clock: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArena {
    pub arena_id: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOfficial {
    pub person_id: String,
    pub name: Option<String>,
    pub jersey_num: Option<String>,
    pub assignment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredTeamStats {
    pub team_id: String,
    pub side: TeamSide,
    pub line: TeamStatsLine,
}

/// An event together with its side entities, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDetail {
    pub event: Event,
    pub arena: Option<StoredArena>,
    pub officials: Vec<StoredOfficial>,
    pub team_stats: Vec<StoredTeamStats>,
}
