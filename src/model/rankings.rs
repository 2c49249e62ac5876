use std::cmp::Ordering;

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::model::{
    state::LeagueState,
    structures::{player::PlayerId, ranking::RankedPlayer, skill_rating::SkillRating}
};

/// Leaderboard of live ratings.
pub fn current(state: &LeagueState) -> Vec<RankedPlayer> {
    let leaderboard = state
        .players
        .values()
        .map(|p| (p.id, unranked(p.id, &p.name, p.rating, None)))
        .collect();

    rank(leaderboard)
}

/// Leaderboard as it stood at the end of `date`. Each player is represented
/// by their latest snapshot on or before that date; players with no history
/// by then are left out.
pub fn as_of(state: &LeagueState, date: NaiveDate) -> Vec<RankedPlayer> {
    let leaderboard = state
        .players
        .values()
        .filter_map(|p| {
            state
                .snapshots
                .rating_as_of(p.id, date)
                .map(|(day, rating)| (p.id, unranked(p.id, &p.name, rating, Some(day))))
        })
        .collect();

    rank(leaderboard)
}

fn unranked(player_id: PlayerId, name: &str, rating: SkillRating, as_of: Option<NaiveDate>) -> RankedPlayer {
    RankedPlayer {
        player_id,
        name: name.to_string(),
        rating,
        rank: 0,
        percentile: 0.0,
        as_of
    }
}

/// Sorts by mean descending (name breaks ties) and fills in rank and percentile.
fn rank(mut leaderboard: IndexMap<PlayerId, RankedPlayer>) -> Vec<RankedPlayer> {
    leaderboard.sort_by(|_, a, _, b| {
        b.rating
            .mu
            .partial_cmp(&a.rating.mu)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let count = leaderboard.len() as i32;
    leaderboard
        .into_values()
        .zip(1..)
        .map(|(mut entry, rank)| {
            entry.rank = rank;
            entry.percentile = percentile(rank, count).unwrap_or_default();
            entry
        })
        .collect()
}

/// `P = (n/N) * 100`
fn percentile(rank: i32, total: i32) -> Option<f64> {
    match rank.cmp(&1) {
        Ordering::Less => None,
        _ => {
            let n = total - rank; // The number of players below the player
            Some(n as f64 / total as f64 * 100.0)
        }
    }
}
