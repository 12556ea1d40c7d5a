//! Merge of the two feed shapes into one [`CanonicalUpdate`].
//!
//! Each present snapshot is first normalized into a [`PartialRecord`]; the
//! records are then merged field by field, `current` over `legacy`. Side
//! entities (arena, officials, team stats) come from `current` only.

pub mod fields;
pub mod status;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::core::model::{
    ArenaUpdate, CanonicalUpdate, EventStatus, OfficialUpdate, TeamSide, TeamStatsLine,
    TeamStatsUpdate,
};
use crate::core::provider::snapshot::{
    CurrentSnapshot, CurrentTeam, CurrentTeamStatistics, LegacySnapshot, LegacyTeam, Scalar,
};
use crate::core::provider::{Composite, SourceVariant};

use fields::{parse_clock, parse_id, parse_int, parse_text, parse_timestamp};

/// The event-level fields both feeds can report, already typed.
#[derive(Debug, Clone, Default, PartialEq)]
struct PartialRecord {
    status: Option<EventStatus>,
    home_team_id: Option<String>,
    away_team_id: Option<String>,
    home_score: Option<i64>,
    away_score: Option<i64>,
    period: Option<i64>,
    clock: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl PartialRecord {
    fn from_legacy(event_id: &str, snapshot: &LegacySnapshot) -> Self {
        let game = &snapshot.game;
        let home = game.home.as_ref();
        let away = game.visitor.as_ref();
        Self {
            status: status::legacy_status(event_id, game.status_num.as_ref()),
            home_team_id: parse_id(home.and_then(|t| t.team_id.as_ref())),
            away_team_id: parse_id(away.and_then(|t| t.team_id.as_ref())),
            home_score: legacy_score(event_id, "hTeam.score", home),
            away_score: legacy_score(event_id, "vTeam.score", away),
            period: parse_int(
                event_id,
                "period.current",
                game.period.as_ref().and_then(|p| p.current.as_ref()),
            ),
            clock: parse_clock(event_id, game.clock.as_deref()),
            start_time: parse_timestamp(event_id, "startTimeUTC", game.start_time_utc.as_deref()),
            end_time: parse_timestamp(event_id, "endTimeUTC", game.end_time_utc.as_deref()),
        }
    }

    fn from_current(event_id: &str, snapshot: &CurrentSnapshot) -> Self {
        let game = &snapshot.game;
        let home = game.home_team.as_ref();
        let away = game.away_team.as_ref();
        Self {
            status: status::current_status(event_id, game.game_status.as_ref()),
            home_team_id: parse_id(home.and_then(|t| t.team_id.as_ref())),
            away_team_id: parse_id(away.and_then(|t| t.team_id.as_ref())),
            home_score: current_score(event_id, "homeTeam.score", home),
            away_score: current_score(event_id, "awayTeam.score", away),
            period: parse_int(event_id, "period", game.period.as_ref()),
            clock: parse_clock(event_id, game.game_clock.as_deref()),
            start_time: parse_timestamp(event_id, "gameTimeUTC", game.game_time_utc.as_deref()),
            end_time: parse_timestamp(
                event_id,
                "gameEndTimeUTC",
                game.game_end_time_utc.as_deref(),
            ),
        }
    }

    /// Field-wise precedence: `self` wherever it has a value, else `fallback`.
    fn or(self, fallback: PartialRecord) -> PartialRecord {
        PartialRecord {
            status: self.status.or(fallback.status),
            home_team_id: self.home_team_id.or(fallback.home_team_id),
            away_team_id: self.away_team_id.or(fallback.away_team_id),
            home_score: self.home_score.or(fallback.home_score),
            away_score: self.away_score.or(fallback.away_score),
            period: self.period.or(fallback.period),
            clock: self.clock.or(fallback.clock),
            start_time: self.start_time.or(fallback.start_time),
            end_time: self.end_time.or(fallback.end_time),
        }
    }
}

fn legacy_score(event_id: &str, field: &str, team: Option<&LegacyTeam>) -> Option<i64> {
    parse_int(event_id, field, team.and_then(|t| t.score.as_ref()))
}

fn current_score(event_id: &str, field: &str, team: Option<&CurrentTeam>) -> Option<i64> {
    parse_int(event_id, field, team.and_then(|t| t.score.as_ref()))
}

/// A snapshot that names a different event than the one requested is
/// discarded rather than merged under the wrong key.
fn names_other_event(event_id: &str, variant: SourceVariant, game_id: Option<&Scalar>) -> bool {
    match parse_id(game_id) {
        Some(reported) if reported != event_id => {
            warn!(
                event_id,
                variant = %variant,
                reported = %reported,
                "Snapshot reports a different event id; ignoring it"
            );
            true
        }
        _ => false,
    }
}

/// Reconcile whatever the fetch produced into one update. Never fails:
/// unusable fields are left unset.
pub fn reconcile(
    external_id: &str,
    composite: &Composite,
    observed_at: DateTime<Utc>,
) -> CanonicalUpdate {
    let legacy = composite
        .legacy
        .as_ref()
        .filter(|s| !names_other_event(external_id, SourceVariant::Legacy, s.game.game_id.as_ref()));
    let current = composite.current.as_ref().filter(|s| {
        !names_other_event(external_id, SourceVariant::Current, s.game.game_id.as_ref())
    });

    let legacy_record = legacy
        .map(|s| PartialRecord::from_legacy(external_id, s))
        .unwrap_or_default();
    let current_record = current
        .map(|s| PartialRecord::from_current(external_id, s))
        .unwrap_or_default();
    let merged = current_record.or(legacy_record);

    let mut update = CanonicalUpdate::empty(external_id, observed_at);
    update.status = merged.status;
    update.home_team_id = merged.home_team_id;
    update.away_team_id = merged.away_team_id;
    update.home_score = merged.home_score;
    update.away_score = merged.away_score;
    update.start_time = merged.start_time;

    // Clock and period only describe a game in progress (or its final state).
    if merged.status != Some(EventStatus::Scheduled) {
        update.period = merged.period;
        update.clock = merged.clock;
    }
    if merged.status == Some(EventStatus::Completed) {
        update.end_time = merged.end_time;
    }

    if let Some(snapshot) = current {
        apply_side_entities(external_id, snapshot, &mut update);
    }
    update
}

fn apply_side_entities(event_id: &str, snapshot: &CurrentSnapshot, update: &mut CanonicalUpdate) {
    let game = &snapshot.game;

    if let Some(arena) = &game.arena {
        let arena = ArenaUpdate {
            arena_id: parse_id(arena.arena_id.as_ref()),
            name: parse_text(arena.arena_name.as_deref()),
            city: parse_text(arena.arena_city.as_deref()),
            state: parse_text(arena.arena_state.as_deref()),
        };
        if arena != ArenaUpdate::default() {
            update.arena = Some(arena);
        }
    }

    update.officials = game
        .officials
        .iter()
        .filter_map(|official| {
            let Some(person_id) = parse_id(official.person_id.as_ref()) else {
                warn!(event_id, "Official without person id; skipping");
                return None;
            };
            Some(OfficialUpdate {
                person_id,
                name: parse_text(official.name.as_deref()),
                jersey_num: parse_id(official.jersey_num.as_ref()),
                assignment: parse_text(official.assignment.as_deref()),
            })
        })
        .collect();

    for (side, team) in [
        (TeamSide::Home, game.home_team.as_ref()),
        (TeamSide::Away, game.away_team.as_ref()),
    ] {
        let Some(team) = team else { continue };
        let (Some(team_id), Some(stats)) = (parse_id(team.team_id.as_ref()), &team.statistics)
        else {
            continue;
        };
        update.team_stats.push(TeamStatsUpdate {
            team_id,
            side,
            line: stats_line(event_id, stats),
        });
    }
}

fn stats_line(event_id: &str, stats: &CurrentTeamStatistics) -> TeamStatsLine {
    let int = |field: &str, raw: &Option<Scalar>| parse_int(event_id, field, raw.as_ref());
    TeamStatsLine {
        points: int("points", &stats.points),
        field_goals_made: int("fieldGoalsMade", &stats.field_goals_made),
        field_goals_attempted: int("fieldGoalsAttempted", &stats.field_goals_attempted),
        three_pointers_made: int("threePointersMade", &stats.three_pointers_made),
        three_pointers_attempted: int("threePointersAttempted", &stats.three_pointers_attempted),
        free_throws_made: int("freeThrowsMade", &stats.free_throws_made),
        free_throws_attempted: int("freeThrowsAttempted", &stats.free_throws_attempted),
        rebounds: int("reboundsTotal", &stats.rebounds_total),
        assists: int("assists", &stats.assists),
        steals: int("steals", &stats.steals),
        blocks: int("blocks", &stats.blocks),
        turnovers: int("turnovers", &stats.turnovers),
        fouls: int("foulsPersonal", &stats.fouls_personal),
    }
}
