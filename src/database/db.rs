use super::db_structs::StoredLeague;
use crate::{
    model::{
        state::LeagueState,
        structures::{
            group::Group,
            league_match::{Match, MatchEntry, MatchId},
            player::{Player, PlayerId},
            rating_adjustment::RatingAdjustment,
            skill_rating::SkillRating
        }
    },
    utils::time_utils::{format_date, format_timestamp, DATE_FORMAT, STORAGE_FORMAT}
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf}
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt data: {0}")]
    Corrupt(String)
}

pub type DbResult<T> = Result<T, DbError>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS players (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE,
        mu REAL NOT NULL,
        sigma REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS team_players (
        team_id INTEGER NOT NULL,
        player_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (team_id, player_id)
    );
    CREATE TABLE IF NOT EXISTS matches (
        id INTEGER PRIMARY KEY,
        datetime TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_matches_datetime ON matches (datetime, id);
    CREATE TABLE IF NOT EXISTS match_teams (
        match_id INTEGER NOT NULL,
        team_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        place INTEGER NOT NULL,
        score INTEGER,
        PRIMARY KEY (match_id, team_id)
    );
    CREATE TABLE IF NOT EXISTS player_days (
        player_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        mu REAL NOT NULL,
        sigma REAL NOT NULL,
        PRIMARY KEY (player_id, date)
    );
    CREATE INDEX IF NOT EXISTS idx_player_days_date ON player_days (date);
    CREATE TABLE IF NOT EXISTS rating_adjustments (
        player_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        match_id INTEGER NOT NULL,
        datetime TEXT NOT NULL,
        mu_before REAL NOT NULL,
        sigma_before REAL NOT NULL,
        mu_after REAL NOT NULL,
        sigma_after REAL NOT NULL,
        PRIMARY KEY (player_id, position)
    );
    CREATE TABLE IF NOT EXISTS undo_checkpoint (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        state TEXT NOT NULL
    );
";

/// Rewritten in full on every save, children first.
const TABLES: [&str; 8] = [
    "undo_checkpoint",
    "rating_adjustments",
    "player_days",
    "match_teams",
    "matches",
    "team_players",
    "teams",
    "players"
];

pub struct DbClient {
    conn: Connection,
    /// `None` for in-memory databases, which are never backed up
    path: Option<PathBuf>
}

impl DbClient {
    /// Opens (or creates) the database file and makes sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> DbResult<DbClient> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        debug!("Opened database {}", path.display());
        Ok(DbClient {
            conn,
            path: Some(path.to_path_buf())
        })
    }

    pub fn open_in_memory() -> DbResult<DbClient> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(DbClient { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load_all(&self) -> DbResult<StoredLeague> {
        let mut state = LeagueState::default();

        self.load_players(&mut state)?;
        self.load_groups(&mut state)?;
        self.load_matches(&mut state)?;
        self.load_adjustments(&mut state)?;
        self.load_player_days(&mut state)?;

        let checkpoint = self.load_checkpoint()?;

        info!(
            "Loaded {} players, {} matches and {} snapshot rows",
            state.players.len(),
            state.timeline.len(),
            state.snapshots.len()
        );

        Ok(StoredLeague { state, checkpoint })
    }

    /// Backs up the current file, then replaces every table's contents in a
    /// single transaction.
    pub fn save_all(&mut self, stored: &StoredLeague) -> DbResult<()> {
        self.backup()?;

        let tx = self.conn.transaction()?;
        for table in TABLES {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }

        let state = &stored.state;
        write_players(&tx, state)?;
        write_groups(&tx, state)?;
        write_matches(&tx, state)?;
        write_adjustments(&tx, state)?;
        write_player_days(&tx, state)?;

        if let Some(checkpoint) = &stored.checkpoint {
            tx.execute(
                "INSERT INTO undo_checkpoint (id, state) VALUES (1, ?1)",
                params![serde_json::to_string(checkpoint)?]
            )?;
        }

        tx.commit()?;

        debug!(
            "Saved {} players, {} matches and {} snapshot rows",
            state.players.len(),
            state.timeline.len(),
            state.snapshots.len()
        );
        Ok(())
    }

    fn backup(&self) -> DbResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if path.exists() {
            let backup = backup_path(path);
            fs::copy(path, &backup)?;
            debug!("Backed up {} to {}", path.display(), backup.display());
        }

        Ok(())
    }

    fn load_players(&self, state: &mut LeagueState) -> DbResult<()> {
        let mut stmt = self.conn.prepare("SELECT id, name, mu, sigma FROM players ORDER BY id")?;
        let rows = stmt.query_map([], Self::player_from_row)?;

        for row in rows {
            let player = row?;
            state.players.insert(player.id, player);
        }

        Ok(())
    }

    fn load_groups(&self, state: &mut LeagueState) -> DbResult<()> {
        let mut stmt = self.conn.prepare("SELECT id FROM teams ORDER BY id")?;
        let ids = stmt.query_map([], |row| row.get::<_, i32>(0))?;
        for id in ids {
            let id = id?;
            state.groups.insert(id, Group { id, players: Vec::new() });
        }

        let mut stmt = self
            .conn
            .prepare("SELECT team_id, player_id FROM team_players ORDER BY team_id, position")?;
        let members = stmt.query_map([], |row| Ok((row.get::<_, i32>(0)?, row.get::<_, PlayerId>(1)?)))?;
        for member in members {
            let (team_id, player_id) = member?;
            state
                .groups
                .get_mut(&team_id)
                .ok_or_else(|| DbError::Corrupt(format!("Team member row for unknown team {}", team_id)))?
                .players
                .push(player_id);
        }

        Ok(())
    }

    fn load_matches(&self, state: &mut LeagueState) -> DbResult<()> {
        let mut matches: BTreeMap<MatchId, Match> = BTreeMap::new();

        let mut stmt = self.conn.prepare("SELECT id, datetime FROM matches")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, MatchId>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (id, datetime) = row?;
            matches.insert(
                id,
                Match {
                    id,
                    timestamp: parse_stored_timestamp(&datetime)?,
                    entries: Vec::new()
                }
            );
        }

        let mut stmt = self
            .conn
            .prepare("SELECT match_id, team_id, place, score FROM match_teams ORDER BY match_id, position")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, MatchId>(0)?, Self::match_entry_from_row(row)?)))?;
        for row in rows {
            let (match_id, entry) = row?;
            matches
                .get_mut(&match_id)
                .ok_or_else(|| DbError::Corrupt(format!("Match team row for unknown match {}", match_id)))?
                .entries
                .push(entry);
        }

        for m in matches.into_values() {
            state.timeline.insert(m);
        }

        Ok(())
    }

    fn load_adjustments(&self, state: &mut LeagueState) -> DbResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, match_id, datetime, mu_before, sigma_before, mu_after, sigma_after \
             FROM rating_adjustments ORDER BY player_id, position"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, PlayerId>(0)?,
                row.get::<_, MatchId>(1)?,
                row.get::<_, String>(2)?,
                SkillRating::new(row.get(3)?, row.get(4)?),
                SkillRating::new(row.get(5)?, row.get(6)?)
            ))
        })?;

        for row in rows {
            let (player_id, match_id, datetime, rating_before, rating_after) = row?;
            state.adjustments.entry(player_id).or_default().push(RatingAdjustment {
                player_id,
                match_id,
                timestamp: parse_stored_timestamp(&datetime)?,
                rating_before,
                rating_after
            });
        }

        Ok(())
    }

    fn load_player_days(&self, state: &mut LeagueState) -> DbResult<()> {
        let mut stmt = self.conn.prepare("SELECT player_id, date, mu, sigma FROM player_days")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, PlayerId>(0)?,
                row.get::<_, String>(1)?,
                SkillRating::new(row.get(2)?, row.get(3)?)
            ))
        })?;

        for row in rows {
            let (player_id, date, rating) = row?;
            let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .map_err(|e| DbError::Corrupt(format!("Invalid snapshot date '{}': {}", date, e)))?;
            state.snapshots.record(player_id, date, rating);
        }

        Ok(())
    }

    fn load_checkpoint(&self) -> DbResult<Option<LeagueState>> {
        let json = self
            .conn
            .query_row("SELECT state FROM undo_checkpoint WHERE id = 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;

        Ok(json.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    fn player_from_row(row: &Row) -> rusqlite::Result<Player> {
        Ok(Player {
            id: row.get("id")?,
            name: row.get("name")?,
            rating: SkillRating::new(row.get("mu")?, row.get("sigma")?)
        })
    }

    fn match_entry_from_row(row: &Row) -> rusqlite::Result<MatchEntry> {
        Ok(MatchEntry {
            group_id: row.get("team_id")?,
            place: row.get("place")?,
            score: row.get("score")?
        })
    }
}

/// `league.db` is backed up to `league_backup.db` next to it.
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(|| "league".to_string(), |s| s.to_string_lossy().into_owned());

    let name = match path.extension() {
        Some(ext) => format!("{}_backup.{}", stem, ext.to_string_lossy()),
        None => format!("{}_backup", stem)
    };

    path.with_file_name(name)
}

fn parse_stored_timestamp(value: &str) -> DbResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, STORAGE_FORMAT)
        .map_err(|e| DbError::Corrupt(format!("Invalid timestamp '{}': {}", value, e)))
}

fn write_players(conn: &Connection, state: &LeagueState) -> DbResult<()> {
    let mut stmt = conn.prepare("INSERT INTO players (id, name, mu, sigma) VALUES (?1, ?2, ?3, ?4)")?;
    for p in state.players.values() {
        stmt.execute(params![p.id, p.name, p.rating.mu, p.rating.sigma])?;
    }

    Ok(())
}

fn write_groups(conn: &Connection, state: &LeagueState) -> DbResult<()> {
    let mut team_stmt = conn.prepare("INSERT INTO teams (id) VALUES (?1)")?;
    let mut member_stmt =
        conn.prepare("INSERT INTO team_players (team_id, player_id, position) VALUES (?1, ?2, ?3)")?;

    for group in state.groups.values() {
        team_stmt.execute(params![group.id])?;
        for (position, player_id) in group.players.iter().enumerate() {
            member_stmt.execute(params![group.id, player_id, position as i64])?;
        }
    }

    Ok(())
}

fn write_matches(conn: &Connection, state: &LeagueState) -> DbResult<()> {
    let mut match_stmt = conn.prepare("INSERT INTO matches (id, datetime) VALUES (?1, ?2)")?;
    let mut entry_stmt = conn.prepare(
        "INSERT INTO match_teams (match_id, team_id, position, place, score) VALUES (?1, ?2, ?3, ?4, ?5)"
    )?;

    for m in state.timeline.iter() {
        match_stmt.execute(params![m.id, format_timestamp(m.timestamp)])?;
        for (position, entry) in m.entries.iter().enumerate() {
            entry_stmt.execute(params![m.id, entry.group_id, position as i64, entry.place, entry.score])?;
        }
    }

    Ok(())
}

fn write_adjustments(conn: &Connection, state: &LeagueState) -> DbResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO rating_adjustments \
         (player_id, position, match_id, datetime, mu_before, sigma_before, mu_after, sigma_after) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
    )?;

    for (player_id, log) in &state.adjustments {
        for (position, a) in log.iter().enumerate() {
            stmt.execute(params![
                player_id,
                position as i64,
                a.match_id,
                format_timestamp(a.timestamp),
                a.rating_before.mu,
                a.rating_before.sigma,
                a.rating_after.mu,
                a.rating_after.sigma
            ])?;
        }
    }

    Ok(())
}

fn write_player_days(conn: &Connection, state: &LeagueState) -> DbResult<()> {
    let mut stmt = conn.prepare("INSERT INTO player_days (player_id, date, mu, sigma) VALUES (?1, ?2, ?3, ?4)")?;
    for row in state.snapshots.rows() {
        stmt.execute(params![row.player_id, format_date(row.date), row.mu, row.sigma])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{backup_path, DbClient};
    use crate::{
        database::db_structs::StoredLeague,
        utils::test_utils::{generate_store, new_entry, timestamp}
    };
    use std::path::Path;

    #[test]
    fn test_backup_path() {
        assert_eq!(backup_path(Path::new("league.db")), Path::new("league_backup.db"));
        assert_eq!(backup_path(Path::new("/tmp/data/x.sqlite")), Path::new("/tmp/data/x_backup.sqlite"));
        assert_eq!(backup_path(Path::new("league")), Path::new("league_backup"));
    }

    #[test]
    fn test_empty_database_loads_empty_league() {
        let client = DbClient::open_in_memory().unwrap();

        let stored = client.load_all().unwrap();

        assert_eq!(stored, StoredLeague::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut store = generate_store(4);
        store
            .add_match(
                Some(timestamp(1, 10, 0)),
                vec![new_entry(&[1, 2], 1), new_entry(&[3], 2), new_entry(&[4], 2)]
            )
            .unwrap();
        store
            .add_match(Some(timestamp(2, 18, 30)), vec![new_entry(&[4], 1), new_entry(&[1], 2)])
            .unwrap();

        let stored = StoredLeague {
            state: store.state().clone(),
            checkpoint: store.checkpoint().cloned()
        };

        let mut client = DbClient::open_in_memory().unwrap();
        client.save_all(&stored).unwrap();
        let loaded = client.load_all().unwrap();

        assert_eq!(loaded, stored);
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let mut store = generate_store(3);
        let mut client = DbClient::open_in_memory().unwrap();
        client
            .save_all(&StoredLeague {
                state: store.state().clone(),
                checkpoint: None
            })
            .unwrap();

        store.delete_player("Player 3").unwrap();
        client
            .save_all(&StoredLeague {
                state: store.state().clone(),
                checkpoint: None
            })
            .unwrap();

        let loaded = client.load_all().unwrap();
        assert_eq!(loaded.state.players.len(), 2);
        assert!(loaded.checkpoint.is_none());
    }
}
