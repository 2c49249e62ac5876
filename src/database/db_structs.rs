use crate::model::{
    state::LeagueState,
    structures::{
        group::GroupId,
        league_match::MatchId,
        player::PlayerId,
        player_day::PlayerDaySnapshot
    }
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Everything persisted between invocations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredLeague {
    pub state: LeagueState,
    /// State before the last successful mutation
    pub checkpoint: Option<LeagueState>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub mu: f64,
    pub sigma: f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub id: GroupId,
    pub players: Vec<PlayerId>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchTeamRecord {
    pub team_id: GroupId,
    pub place: u32,
    #[serde(default)]
    pub score: Option<i64>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub datetime: NaiveDateTime,
    pub match_teams: Vec<MatchTeamRecord>
}

/// The JSON import/export document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeagueDocument {
    pub players: Vec<PlayerRecord>,
    pub teams: Vec<TeamRecord>,
    pub matches: Vec<MatchRecord>,
    /// Written on export for reference; ignored on import
    #[serde(default)]
    pub player_days: Vec<PlayerDaySnapshot>
}
