use super::{
    db::{DbError, DbResult},
    db_structs::{LeagueDocument, MatchRecord, MatchTeamRecord, PlayerRecord, TeamRecord}
};
use crate::model::{
    constants::MIN_GROUPS_PER_MATCH,
    state::LeagueState,
    structures::{
        group::Group,
        league_match::{Match, MatchEntry},
        player::Player,
        skill_rating::SkillRating
    }
};
use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path
};
use tracing::info;

pub fn to_document(state: &LeagueState) -> LeagueDocument {
    LeagueDocument {
        players: state
            .players
            .values()
            .map(|p| PlayerRecord {
                id: p.id,
                name: p.name.clone(),
                mu: p.rating.mu,
                sigma: p.rating.sigma
            })
            .collect(),
        teams: state
            .groups
            .values()
            .map(|g| TeamRecord {
                id: g.id,
                players: g.players.clone()
            })
            .collect(),
        matches: state
            .timeline
            .iter()
            .map(|m| MatchRecord {
                id: m.id,
                datetime: m.timestamp,
                match_teams: m
                    .entries
                    .iter()
                    .map(|e| MatchTeamRecord {
                        team_id: e.group_id,
                        place: e.place,
                        score: e.score
                    })
                    .collect()
            })
            .collect(),
        player_days: state.snapshots.rows()
    }
}

/// Builds a league from an imported document. Ratings and snapshots are
/// taken as-is and are expected to be rebuilt by the caller.
pub fn from_document(document: LeagueDocument) -> DbResult<LeagueState> {
    let mut state = LeagueState::default();

    for record in document.players {
        if state.find_player(&record.name).is_some() {
            return Err(DbError::Corrupt(format!("Duplicate player name '{}'", record.name)));
        }

        let player = Player {
            id: record.id,
            name: record.name,
            rating: SkillRating::new(record.mu, record.sigma)
        };
        if let Some(previous) = state.players.insert(player.id, player) {
            return Err(DbError::Corrupt(format!("Duplicate player id {}", previous.id)));
        }
    }

    for record in document.teams {
        let group = Group {
            id: record.id,
            players: record.players
        };
        if state.groups.insert(group.id, group).is_some() {
            return Err(DbError::Corrupt(format!("Duplicate team id {}", record.id)));
        }
    }

    let mut used_teams = BTreeSet::new();
    for record in document.matches {
        if state.timeline.contains(record.id) {
            return Err(DbError::Corrupt(format!("Duplicate match id {}", record.id)));
        }

        if record.match_teams.len() < MIN_GROUPS_PER_MATCH {
            return Err(DbError::Corrupt(format!(
                "Match {} has {} teams, at least {} are needed",
                record.id,
                record.match_teams.len(),
                MIN_GROUPS_PER_MATCH
            )));
        }

        let mut match_players = BTreeSet::new();
        for entry in &record.match_teams {
            let group = state.groups.get(&entry.team_id).ok_or_else(|| {
                DbError::Corrupt(format!(
                    "Match {} references unknown team {}",
                    record.id, entry.team_id
                ))
            })?;
            if !used_teams.insert(entry.team_id) {
                return Err(DbError::Corrupt(format!(
                    "Team {} is used by more than one match entry",
                    entry.team_id
                )));
            }
            if group.players.is_empty() {
                return Err(DbError::Corrupt(format!("Team {} in match {} is empty", group.id, record.id)));
            }
            if let Some(player_id) = group.players.iter().find(|id| !match_players.insert(**id)) {
                return Err(DbError::Corrupt(format!(
                    "Player {} appears more than once in match {}",
                    player_id, record.id
                )));
            }
        }

        state.timeline.insert(Match {
            id: record.id,
            timestamp: record.datetime,
            entries: record
                .match_teams
                .into_iter()
                .map(|e| MatchEntry {
                    group_id: e.team_id,
                    place: e.place,
                    score: e.score
                })
                .collect()
        });
    }

    Ok(state)
}

pub fn export_json(state: &LeagueState, path: impl AsRef<Path>) -> DbResult<()> {
    let path = path.as_ref();
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &to_document(state))?;

    info!(
        "Exported {} players and {} matches to {}",
        state.players.len(),
        state.timeline.len(),
        path.display()
    );
    Ok(())
}

pub fn import_json(path: impl AsRef<Path>) -> DbResult<LeagueState> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let document: LeagueDocument = serde_json::from_reader(reader)?;

    from_document(document)
}
