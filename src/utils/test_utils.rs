use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::{
    participants::places_from_scores,
    state::LeagueState,
    store::LeagueStore,
    structures::{
        league_match::NewEntry,
        player::{Player, PlayerId},
        skill_rating::SkillRating
    },
    RatingEngine
};

/// 2024-01-`day` at the given time.
pub fn timestamp(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(day)
        .and_hms_opt(hour, minute, 0)
        .expect("Expected a valid time of day")
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).expect("Expected a valid day of January 2024")
}

/// State with players `Player 1` to `Player n`, ids `1..=n`, at the baseline.
pub fn generate_state(n: i32) -> LeagueState {
    let mut state = LeagueState::default();
    for id in 1..=n {
        state.players.insert(id, Player::new(id, &format!("Player {}", id)));
    }

    state
}

pub fn generate_store(n: i32) -> LeagueStore {
    let mut store = LeagueStore::default();
    if n > 0 {
        let names: Vec<String> = (1..=n).map(|id| format!("Player {}", id)).collect();
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        store.add_players(&names).expect("Expected players to be added");
    }

    store
}

pub fn new_entry(players: &[PlayerId], place: u32) -> NewEntry {
    NewEntry {
        players: players.to_vec(),
        place,
        score: None
    }
}

/// Seeded random match history over players `1..=n_players`: 2 to 4 groups
/// of 1 or 2 players, places drawn from random scores (so ties happen), and
/// timestamps on a 30 minute grid across 20 days (so equal timestamps happen).
/// Matches are returned in insertion order, not timeline order.
pub fn generate_history(seed: u64, n_players: i32, n_matches: usize) -> Vec<(NaiveDateTime, Vec<NewEntry>)> {
    assert!(n_players >= 2, "Need at least two players for a match");

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let start = timestamp(1, 0, 0);
    let mut ids: Vec<PlayerId> = (1..=n_players).collect();

    (0..n_matches)
        .map(|_| {
            let slot: i64 = rng.random_range(0..20 * 48);
            let at = start + Duration::minutes(slot * 30);

            ids.shuffle(&mut rng);
            let max_groups = 4.min(n_players as usize);
            let n_groups = rng.random_range(2..=max_groups);

            let mut groups: Vec<Vec<PlayerId>> = Vec::with_capacity(n_groups);
            let mut remaining = ids.iter().copied();
            let mut left = ids.len();
            for i in 0..n_groups {
                // Keep at least one player for each group still to fill
                let still_needed = n_groups - i - 1;
                let size = if left - still_needed >= 2 && rng.random_bool(0.3) {
                    2
                } else {
                    1
                };
                groups.push(remaining.by_ref().take(size).collect());
                left -= size;
            }

            let scores: Vec<i64> = (0..n_groups).map(|_| rng.random_range(0..3)).collect();
            let places = places_from_scores(&scores);

            let entries = groups
                .into_iter()
                .zip(places)
                .zip(scores)
                .map(|((players, place), score)| NewEntry {
                    players,
                    place,
                    score: Some(score)
                })
                .collect();

            (at, entries)
        })
        .collect()
}

/// Ratings from a naive replay of every match up to and including `until`,
/// starting everyone at the baseline. Independent of the incremental engine.
pub fn reference_ratings(
    state: &LeagueState,
    engine: &impl RatingEngine,
    until: NaiveDateTime
) -> BTreeMap<PlayerId, SkillRating> {
    let mut ratings: BTreeMap<PlayerId, SkillRating> =
        state.players.keys().map(|id| (*id, SkillRating::baseline())).collect();

    for m in state.timeline.iter().take_while(|m| m.timestamp <= until) {
        let groups: Vec<Vec<PlayerId>> = m
            .entries
            .iter()
            .map(|e| state.groups[&e.group_id].players.clone())
            .collect();
        let before: Vec<Vec<SkillRating>> = groups
            .iter()
            .map(|g| g.iter().map(|id| ratings[id]).collect())
            .collect();
        let ranks: Vec<u32> = m.entries.iter().map(|e| e.place).collect();

        let after = engine.update(&before, &ranks);
        for (group, results) in groups.iter().zip(after) {
            for (id, rating) in group.iter().zip(results) {
                ratings.insert(*id, rating);
            }
        }
    }

    ratings
}

/// What a snapshot row for `date` must hold: the naive replay up to the end
/// of that day, restricted to players who played on it.
pub fn reference_day_ratings(
    state: &LeagueState,
    engine: &impl RatingEngine,
    date: NaiveDate
) -> BTreeMap<PlayerId, SkillRating> {
    let end_of_day = date.and_hms_opt(23, 59, 59).expect("Expected a valid end of day");
    let ratings = reference_ratings(state, engine, end_of_day);

    state
        .timeline
        .iter()
        .filter(|m| m.date() == date)
        .flat_map(|m| state.entry_players(&m.entries))
        .map(|id| (id, ratings[&id]))
        .collect()
}
