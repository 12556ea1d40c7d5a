use rusqlite::{Connection, OptionalExtension, params};

use super::StoreError;
use crate::core::model::{
    ArenaUpdate, OfficialUpdate, StoredArena, StoredOfficial, StoredTeamStats, TeamSide,
    TeamStatsLine, TeamStatsUpdate,
};

pub(super) fn upsert_arena(
    conn: &Connection,
    event_id: i64,
    arena: &ArenaUpdate,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO arenas (event_id, arena_id, name, city, state)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(event_id) DO UPDATE SET
            arena_id = COALESCE(excluded.arena_id, arenas.arena_id),
            name = COALESCE(excluded.name, arenas.name),
            city = COALESCE(excluded.city, arenas.city),
            state = COALESCE(excluded.state, arenas.state)",
        params![event_id, arena.arena_id, arena.name, arena.city, arena.state],
    )?;
    Ok(())
}

pub(super) fn upsert_official(
    conn: &Connection,
    event_id: i64,
    official: &OfficialUpdate,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO officials (event_id, person_id, name, jersey_num, assignment)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(event_id, person_id) DO UPDATE SET
            name = COALESCE(excluded.name, officials.name),
            jersey_num = COALESCE(excluded.jersey_num, officials.jersey_num),
            assignment = COALESCE(excluded.assignment, officials.assignment)",
        params![
            event_id,
            official.person_id,
            official.name,
            official.jersey_num,
            official.assignment
        ],
    )?;
    Ok(())
}

pub(super) fn upsert_team_stats(
    conn: &Connection,
    event_id: i64,
    stats: &TeamStatsUpdate,
) -> Result<(), StoreError> {
    let line = &stats.line;
    conn.execute(
        "INSERT INTO team_stats (
            event_id, team_id, side, points,
            field_goals_made, field_goals_attempted,
            three_pointers_made, three_pointers_attempted,
            free_throws_made, free_throws_attempted,
            rebounds, assists, steals, blocks, turnovers, fouls
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(event_id, team_id) DO UPDATE SET
            side = excluded.side,
            points = COALESCE(excluded.points, team_stats.points),
            field_goals_made = COALESCE(excluded.field_goals_made, team_stats.field_goals_made),
            field_goals_attempted = COALESCE(excluded.field_goals_attempted, team_stats.field_goals_attempted),
            three_pointers_made = COALESCE(excluded.three_pointers_made, team_stats.three_pointers_made),
            three_pointers_attempted = COALESCE(excluded.three_pointers_attempted, team_stats.three_pointers_attempted),
            free_throws_made = COALESCE(excluded.free_throws_made, team_stats.free_throws_made),
            free_throws_attempted = COALESCE(excluded.free_throws_attempted, team_stats.free_throws_attempted),
            rebounds = COALESCE(excluded.rebounds, team_stats.rebounds),
            assists = COALESCE(excluded.assists, team_stats.assists),
            steals = COALESCE(excluded.steals, team_stats.steals),
            blocks = COALESCE(excluded.blocks, team_stats.blocks),
            turnovers = COALESCE(excluded.turnovers, team_stats.turnovers),
            fouls = COALESCE(excluded.fouls, team_stats.fouls)",
        params![
            event_id,
            stats.team_id,
            stats.side.as_str(),
            line.points,
            line.field_goals_made,
            line.field_goals_attempted,
            line.three_pointers_made,
            line.three_pointers_attempted,
            line.free_throws_made,
            line.free_throws_attempted,
            line.rebounds,
            line.assists,
            line.steals,
            line.blocks,
            line.turnovers,
            line.fouls,
        ],
    )?;
    Ok(())
}

pub(super) fn load_arena(conn: &Connection, event_id: i64) -> Result<Option<StoredArena>, StoreError> {
    let arena = conn
        .query_row(
            "SELECT arena_id, name, city, state FROM arenas WHERE event_id = ?1",
            params![event_id],
            |row| {
                Ok(StoredArena {
                    arena_id: row.get(0)?,
                    name: row.get(1)?,
                    city: row.get(2)?,
                    state: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(arena)
}

pub(super) fn load_officials(
    conn: &Connection,
    event_id: i64,
) -> Result<Vec<StoredOfficial>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT person_id, name, jersey_num, assignment FROM officials
         WHERE event_id = ?1 ORDER BY person_id ASC",
    )?;
    let rows = stmt.query_map(params![event_id], |row| {
        Ok(StoredOfficial {
            person_id: row.get(0)?,
            name: row.get(1)?,
            jersey_num: row.get(2)?,
            assignment: row.get(3)?,
        })
    })?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub(super) fn load_team_stats(
    conn: &Connection,
    event_id: i64,
) -> Result<Vec<StoredTeamStats>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT team_id, side, points,
                field_goals_made, field_goals_attempted,
                three_pointers_made, three_pointers_attempted,
                free_throws_made, free_throws_attempted,
                rebounds, assists, steals, blocks, turnovers, fouls
         FROM team_stats WHERE event_id = ?1 ORDER BY side DESC",
    )?;
    let rows = stmt.query_map(params![event_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            TeamStatsLine {
                points: row.get(2)?,
                field_goals_made: row.get(3)?,
                field_goals_attempted: row.get(4)?,
                three_pointers_made: row.get(5)?,
                three_pointers_attempted: row.get(6)?,
                free_throws_made: row.get(7)?,
                free_throws_attempted: row.get(8)?,
                rebounds: row.get(9)?,
                assists: row.get(10)?,
                steals: row.get(11)?,
                blocks: row.get(12)?,
                turnovers: row.get(13)?,
                fouls: row.get(14)?,
            },
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (team_id, side, line) = row?;
        let side = TeamSide::from_str_opt(&side).ok_or(StoreError::Corrupt {
            column: "side",
            value: side.clone(),
        })?;
        results.push(StoredTeamStats {
            team_id,
            side,
            line,
        });
    }
    Ok(results)
}
