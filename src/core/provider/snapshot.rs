use serde::Deserialize;
use tracing::warn;

use super::{FetchError, ScheduledEvent, SourceVariant};
use crate::core::reconcile::fields;

/// A scalar as the provider sends it: numbers sometimes arrive as JSON
/// numbers and sometimes as (possibly empty) strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    #[cfg(test)]
    pub fn text(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }

    /// Render as provider text; integral floats drop the fraction.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) if v.fract() == 0.0 => format!("{}", *v as i64),
            Scalar::Float(v) => v.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

// --- legacy feed ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacySnapshot {
    #[serde(rename = "basicGameData", default)]
    pub game: LegacyGame,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyGame {
    #[serde(rename = "gameId")]
    pub game_id: Option<Scalar>,
    #[serde(rename = "statusNum")]
    pub status_num: Option<Scalar>,
    #[serde(rename = "startTimeUTC")]
    pub start_time_utc: Option<String>,
    #[serde(rename = "endTimeUTC")]
    pub end_time_utc: Option<String>,
    pub clock: Option<String>,
    pub period: Option<LegacyPeriod>,
    #[serde(rename = "hTeam")]
    pub home: Option<LegacyTeam>,
    #[serde(rename = "vTeam")]
    pub visitor: Option<LegacyTeam>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyPeriod {
    pub current: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyTeam {
    #[serde(rename = "teamId")]
    pub team_id: Option<Scalar>,
    pub score: Option<Scalar>,
}

// --- current feed ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentSnapshot {
    #[serde(default)]
    pub game: CurrentGame,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentGame {
    pub game_id: Option<Scalar>,
    pub game_status: Option<Scalar>,
    #[serde(rename = "gameTimeUTC")]
    pub game_time_utc: Option<String>,
    #[serde(rename = "gameEndTimeUTC")]
    pub game_end_time_utc: Option<String>,
    pub period: Option<Scalar>,
    pub game_clock: Option<String>,
    pub arena: Option<CurrentArena>,
    pub officials: Vec<CurrentOfficial>,
    pub home_team: Option<CurrentTeam>,
    pub away_team: Option<CurrentTeam>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentArena {
    pub arena_id: Option<Scalar>,
    pub arena_name: Option<String>,
    pub arena_city: Option<String>,
    pub arena_state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentOfficial {
    pub person_id: Option<Scalar>,
    pub name: Option<String>,
    pub jersey_num: Option<Scalar>,
    pub assignment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentTeam {
    pub team_id: Option<Scalar>,
    pub score: Option<Scalar>,
    pub statistics: Option<CurrentTeamStatistics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentTeamStatistics {
    pub points: Option<Scalar>,
    pub field_goals_made: Option<Scalar>,
    pub field_goals_attempted: Option<Scalar>,
    pub three_pointers_made: Option<Scalar>,
    pub three_pointers_attempted: Option<Scalar>,
    pub free_throws_made: Option<Scalar>,
    pub free_throws_attempted: Option<Scalar>,
    pub rebounds_total: Option<Scalar>,
    pub assists: Option<Scalar>,
    pub steals: Option<Scalar>,
    pub blocks: Option<Scalar>,
    pub turnovers: Option<Scalar>,
    pub fouls_personal: Option<Scalar>,
}

/// One decoded provider response, tagged by shape.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Legacy(LegacySnapshot),
    Current(CurrentSnapshot),
}

impl Snapshot {
    pub fn decode(variant: SourceVariant, body: &[u8]) -> Result<Self, FetchError> {
        let decode_err = |e: serde_json::Error| FetchError::Decode {
            variant: variant.as_str(),
            message: e.to_string(),
        };
        match variant {
            SourceVariant::Legacy => serde_json::from_slice::<LegacySnapshot>(body)
                .map(Snapshot::Legacy)
                .map_err(decode_err),
            SourceVariant::Current => serde_json::from_slice::<CurrentSnapshot>(body)
                .map(Snapshot::Current)
                .map_err(decode_err),
        }
    }
}

/// Both feeds for one event at one tick. A `None` slot means that source
/// failed or was not fetched.
#[derive(Debug, Clone, Default)]
pub struct Composite {
    pub legacy: Option<LegacySnapshot>,
    pub current: Option<CurrentSnapshot>,
}

impl Composite {
    pub fn insert(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Legacy(s) => self.legacy = Some(s),
            Snapshot::Current(s) => self.current = Some(s),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.legacy.is_none() && self.current.is_none()
    }

    pub fn present_variants(&self) -> Vec<SourceVariant> {
        let mut out = Vec::with_capacity(2);
        if self.legacy.is_some() {
            out.push(SourceVariant::Legacy);
        }
        if self.current.is_some() {
            out.push(SourceVariant::Current);
        }
        out
    }
}

// --- day listing ---

#[derive(Debug, Default, Deserialize)]
struct ListingWire {
    #[serde(default)]
    events: Vec<ListingEntryWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListingEntryWire {
    game_id: Option<Scalar>,
    #[serde(rename = "gameTimeUTC")]
    game_time_utc: Option<String>,
}

/// Decode the listing. Entries without an id or a usable start time are
/// skipped; the rest of the listing still schedules.
pub fn decode_listing(body: &[u8]) -> Result<Vec<ScheduledEvent>, FetchError> {
    let wire: ListingWire = serde_json::from_slice(body).map_err(|e| FetchError::Decode {
        variant: "schedule",
        message: e.to_string(),
    })?;

    let mut events = Vec::with_capacity(wire.events.len());
    for entry in wire.events {
        let Some(external_id) = entry
            .game_id
            .as_ref()
            .map(|id| id.to_text().trim().to_string())
            .filter(|id| !id.is_empty())
        else {
            warn!("Skipping listing entry without an event id");
            continue;
        };
        let Some(start_time) =
            fields::parse_timestamp(&external_id, "gameTimeUTC", entry.game_time_utc.as_deref())
        else {
            warn!(event_id = %external_id, "Skipping listing entry without a start time");
            continue;
        };
        events.push(ScheduledEvent {
            external_id,
            start_time,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_decodes_textual_fields() {
        let body = br#"{"basicGameData":{"gameId":"E1","statusNum":"2","clock":"5:12",
            "period":{"current":"2"},"hTeam":{"teamId":"100","score":""},
            "vTeam":{"teamId":"200","score":"98"}}}"#;
        let Snapshot::Legacy(s) = Snapshot::decode(SourceVariant::Legacy, body).unwrap() else {
            panic!("expected legacy snapshot");
        };
        assert_eq!(s.game.status_num, Some(Scalar::text("2")));
        assert_eq!(s.game.home.unwrap().score, Some(Scalar::text("")));
        assert_eq!(s.game.visitor.unwrap().score, Some(Scalar::text("98")));
    }

    #[test]
    fn current_decodes_numbers_and_side_entities() {
        let body = br#"{"game":{"gameId":"E1","gameStatus":3,"period":4,
            "gameClock":"PT00M00.00S","arena":{"arenaId":10,"arenaName":"Chase Center"},
            "officials":[{"personId":7,"name":"Ref One","jerseyNum":"12"}],
            "homeTeam":{"teamId":100,"score":102,"statistics":{"points":102,"assists":25}}}}"#;
        let Snapshot::Current(s) = Snapshot::decode(SourceVariant::Current, body).unwrap() else {
            panic!("expected current snapshot");
        };
        assert_eq!(s.game.game_status, Some(Scalar::Int(3)));
        assert_eq!(s.game.officials.len(), 1);
        assert_eq!(
            s.game.arena.unwrap().arena_name.as_deref(),
            Some("Chase Center")
        );
        let stats = s.game.home_team.unwrap().statistics.unwrap();
        assert_eq!(stats.assists, Some(Scalar::Int(25)));
        assert!(s.game.away_team.is_none());
    }

    #[test]
    fn nulls_and_missing_fields_decode_as_none() {
        let body = br#"{"game":{"gameId":"E1","gameStatus":null}}"#;
        let Snapshot::Current(s) = Snapshot::decode(SourceVariant::Current, body).unwrap() else {
            panic!("expected current snapshot");
        };
        assert!(s.game.game_status.is_none());
        assert!(s.game.period.is_none());
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let err = Snapshot::decode(SourceVariant::Legacy, b"<html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { variant: "legacy", .. }));
    }

    #[test]
    fn composite_tracks_present_slots() {
        let mut composite = Composite::default();
        assert!(composite.is_empty());
        composite.insert(Snapshot::Current(CurrentSnapshot::default()));
        assert!(!composite.is_empty());
        assert_eq!(composite.present_variants(), vec![SourceVariant::Current]);
    }

    #[test]
    fn listing_skips_unusable_entries() {
        let body = br#"{"events":[
            {"gameId":"E1","gameTimeUTC":"2026-10-19T23:30:00Z","gameStatus":1},
            {"gameId":"","gameTimeUTC":"2026-10-19T23:30:00Z"},
            {"gameId":"E3","gameTimeUTC":"not a time"},
            {"gameId":42,"gameTimeUTC":"2026-10-20T02:00:00Z","gameStatus":99}
        ]}"#;
        let events = decode_listing(body).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].external_id, "E1");
        assert_eq!(events[1].external_id, "42");
        assert_eq!(
            events[1].start_time,
            chrono::DateTime::parse_from_rfc3339("2026-10-20T02:00:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc)
        );
    }

    #[test]
    fn scalar_text_rendering() {
        assert_eq!(Scalar::Int(7).to_text(), "7");
        assert_eq!(Scalar::Float(10.0).to_text(), "10");
        assert_eq!(Scalar::text(" x ").to_text(), " x ");
    }
}
