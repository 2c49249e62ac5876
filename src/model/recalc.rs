use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::{
    model::{
        error::{LeagueError, LeagueResult},
        snapshot_tracker::DayRatings,
        state::LeagueState,
        structures::{
            league_match::Match, player::PlayerId, rating_adjustment::RatingAdjustment, skill_rating::SkillRating
        },
        RatingEngine
    },
    utils::{progress_utils::progress_span, time_utils::day_start}
};

/// What a recomputation touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replay {
    /// Matches re-rated
    pub replayed: usize,
    /// Players rewound to their rating before the cutoff
    pub rewound: BTreeSet<PlayerId>,
    /// Calendar dates whose snapshot rows are now stale
    pub dates: BTreeSet<NaiveDate>,
    /// End-of-day ratings of every player who played on one of `dates`
    pub day_ratings: DayRatings
}

/// Recomputes ratings after history changed at or after `cutoff`, then
/// rewrites the snapshot rows of every affected date.
///
/// `stale_dates` are dates that lost matches in the mutation (the old date of
/// a deleted or moved match) and must be invalidated even if no match remains
/// on them.
pub fn refresh<E: RatingEngine + ?Sized>(
    state: &mut LeagueState,
    engine: &E,
    cutoff: NaiveDateTime,
    stale_dates: &[NaiveDate]
) -> LeagueResult<Replay> {
    let replay = recompute_from(state, engine, cutoff, stale_dates)?;
    state.snapshots.materialize(&replay.dates, &replay.day_ratings);

    Ok(replay)
}

/// Rebuilds every rating and snapshot from scratch.
pub fn rebuild_all<E: RatingEngine + ?Sized>(state: &mut LeagueState, engine: &E) -> LeagueResult<Replay> {
    info!(
        "Rebuilding ratings for {} players from {} matches",
        state.players.len(),
        state.timeline.len()
    );

    for player in state.players.values_mut() {
        player.rating = SkillRating::baseline();
    }
    state.adjustments.clear();

    let stale: Vec<NaiveDate> = state.snapshots.dates().copied().collect();
    state.snapshots.clear();

    refresh(state, engine, NaiveDateTime::MIN, &stale)
}

/// # History-consistent recomputation
///
/// 1. Every match at or after `cutoff` is affected.
/// 2. Affected players are those appearing in an affected match, plus those
///    whose replay log reaches past `cutoff` (their later matches may have
///    just been removed).
/// 3. Affected players are rewound to the rating they held right before
///    `cutoff`: the last replay-log entry before it, or the baseline.
///    Everyone else already holds a correct rating, since nothing before
///    `cutoff` changed.
/// 4. Affected matches are replayed in timeline order using their stored
///    places as ranks.
///
/// The walk starts at the beginning of `cutoff`'s calendar day so that
/// same-day matches before the cutoff still contribute their players to that
/// day's snapshot rows. They are not re-rated.
pub fn recompute_from<E: RatingEngine + ?Sized>(
    state: &mut LeagueState,
    engine: &E,
    cutoff: NaiveDateTime,
    stale_dates: &[NaiveDate]
) -> LeagueResult<Replay> {
    let walk: Vec<Match> = state.timeline.range_from(day_start(cutoff)).cloned().collect();

    let mut affected_players = BTreeSet::new();
    for m in walk.iter().filter(|m| m.timestamp >= cutoff) {
        for player_id in match_players(state, m)? {
            if !state.players.contains_key(&player_id) {
                return Err(LeagueError::integrity(format!(
                    "Match {} references player {} which no longer exists",
                    m.id, player_id
                )));
            }
            affected_players.insert(player_id);
        }
    }

    for (player_id, log) in &state.adjustments {
        if log.last().is_some_and(|a| a.timestamp >= cutoff) {
            affected_players.insert(*player_id);
        }
    }

    for player_id in &affected_players {
        rewind(state, *player_id, cutoff);
    }

    let mut replay = Replay {
        rewound: affected_players,
        dates: stale_dates.iter().copied().collect(),
        ..Default::default()
    };

    let progress = progress_span(walk.len() as u64, "Replaying match history");
    let _entered = progress.as_ref().map(|span| span.enter());
    let mut day_players: BTreeSet<PlayerId> = BTreeSet::new();
    for (i, m) in walk.iter().enumerate() {
        if m.timestamp >= cutoff {
            apply_match(state, engine, m)?;
            replay.replayed += 1;
        }

        let date = m.date();
        replay.dates.insert(date);
        day_players.extend(state.entry_players(&m.entries));

        let day_complete = walk.get(i + 1).map_or(true, |next| next.date() != date);
        if day_complete {
            let ratings = replay.day_ratings.entry(date).or_default();
            for player_id in &day_players {
                // Deleted players only appear in matches before the cutoff
                if let Some(player) = state.players.get(player_id) {
                    ratings.insert(*player_id, player.rating);
                }
            }
            day_players.clear();
        }

        if let Some(span) = &progress {
            span.pb_inc(1);
        }
    }

    debug!(
        "Recomputed from {}: {} matches replayed, {} players rewound, {} dates touched",
        cutoff,
        replay.replayed,
        replay.rewound.len(),
        replay.dates.len()
    );

    Ok(replay)
}

fn match_players(state: &LeagueState, m: &Match) -> LeagueResult<Vec<PlayerId>> {
    let mut players = Vec::new();
    for entry in &m.entries {
        let group = state.groups.get(&entry.group_id).ok_or_else(|| {
            LeagueError::integrity(format!(
                "Match {} references team {} which does not exist",
                m.id, entry.group_id
            ))
        })?;
        players.extend(group.players.iter().copied());
    }

    Ok(players)
}

/// Drops the player's replay-log entries at or after `cutoff` and restores the
/// rating they held before it.
fn rewind(state: &mut LeagueState, player_id: PlayerId, cutoff: NaiveDateTime) {
    let rating = match state.adjustments.get_mut(&player_id) {
        Some(log) => {
            let keep = log.partition_point(|a| a.timestamp < cutoff);
            log.truncate(keep);
            log.last().map(|a| a.rating_after)
        }
        None => None
    };

    if rating.is_none() {
        state.adjustments.remove(&player_id);
    }

    if let Some(player) = state.players.get_mut(&player_id) {
        player.rating = rating.unwrap_or_else(SkillRating::baseline);
    }
}

/// Rates a single match against the live ratings and records the result.
fn apply_match<E: RatingEngine + ?Sized>(state: &mut LeagueState, engine: &E, m: &Match) -> LeagueResult<()> {
    let mut groups: Vec<Vec<PlayerId>> = Vec::with_capacity(m.entries.len());
    let mut ratings: Vec<Vec<SkillRating>> = Vec::with_capacity(m.entries.len());
    let mut ranks: Vec<u32> = Vec::with_capacity(m.entries.len());

    for entry in &m.entries {
        let group = state.groups.get(&entry.group_id).ok_or_else(|| {
            LeagueError::integrity(format!(
                "Match {} references team {} which does not exist",
                m.id, entry.group_id
            ))
        })?;

        let group_ratings = group
            .players
            .iter()
            .map(|player_id| {
                state.players.get(player_id).map(|p| p.rating).ok_or_else(|| {
                    LeagueError::integrity(format!(
                        "Match {} references player {} which no longer exists",
                        m.id, player_id
                    ))
                })
            })
            .collect::<LeagueResult<Vec<SkillRating>>>()?;

        groups.push(group.players.clone());
        ratings.push(group_ratings);
        ranks.push(entry.place);
    }

    let results = engine.update(&ratings, &ranks);

    let shape_matches =
        results.len() == groups.len() && results.iter().zip(&groups).all(|(result, group)| result.len() == group.len());
    if !shape_matches {
        return Err(LeagueError::integrity(format!(
            "Rating engine returned a result of the wrong shape for match {}",
            m.id
        )));
    }

    for ((group, before), after) in groups.iter().zip(&ratings).zip(&results) {
        for ((player_id, rating_before), rating_after) in group.iter().zip(before).zip(after) {
            if let Some(player) = state.players.get_mut(player_id) {
                player.rating = *rating_after;
            }

            state.adjustments.entry(*player_id).or_default().push(RatingAdjustment {
                player_id: *player_id,
                match_id: m.id,
                timestamp: m.timestamp,
                rating_before: *rating_before,
                rating_after: *rating_after
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{rebuild_all, refresh};
    use crate::{
        model::{
            create_model,
            error::LeagueError,
            structures::{league_match::Match, skill_rating::SkillRating}
        },
        utils::test_utils::{date, generate_state, new_entry, timestamp}
    };

    fn push_match(state: &mut crate::model::state::LeagueState, id: i32, day: u32, hour: u32, groups: &[&[i32]]) {
        let entries = groups
            .iter()
            .enumerate()
            .map(|(i, players)| new_entry(players, i as u32 + 1))
            .collect();
        let entries = state.create_groups(entries);
        state.timeline.insert(Match {
            id,
            timestamp: timestamp(day, hour, 0),
            entries
        });
    }

    #[test]
    fn test_refresh_rates_new_match() {
        let model = create_model();
        let mut state = generate_state(2);
        push_match(&mut state, 1, 1, 10, &[&[1], &[2]]);

        let replay = refresh(&mut state, &model, timestamp(1, 10, 0), &[]).unwrap();

        assert_eq!(replay.replayed, 1);
        assert!(state.players[&1].rating.mu > SkillRating::baseline().mu);
        assert!(state.players[&2].rating.mu < SkillRating::baseline().mu);
        assert_eq!(state.adjustments[&1].len(), 1);
        assert_eq!(state.snapshots.get(1, date(1)), Some(state.players[&1].rating));
    }

    #[test]
    fn test_rewind_keeps_history_before_cutoff() {
        let model = create_model();
        let mut state = generate_state(3);
        push_match(&mut state, 1, 1, 10, &[&[1], &[2]]);
        push_match(&mut state, 2, 3, 10, &[&[1], &[3]]);
        rebuild_all(&mut state, &model).unwrap();

        let after_first = state.adjustments[&1][0].rating_after;
        let final_rating = state.players[&1].rating;

        // Re-running from the second match must start player 1 from their
        // rating after the first match, not from the baseline
        let replay = refresh(&mut state, &model, timestamp(3, 10, 0), &[]).unwrap();

        assert_eq!(replay.replayed, 1);
        assert!(!replay.rewound.contains(&2));
        assert_eq!(state.adjustments[&1][1].rating_before, after_first);
        assert_eq!(state.players[&1].rating, final_rating);
    }

    #[test]
    fn test_removed_match_players_are_rewound() {
        let model = create_model();
        let mut state = generate_state(2);
        push_match(&mut state, 1, 1, 10, &[&[1], &[2]]);
        rebuild_all(&mut state, &model).unwrap();

        let removed = state.timeline.remove(1).unwrap();
        state.remove_groups(&removed.entries);
        let replay = refresh(&mut state, &model, removed.timestamp, &[removed.date()]).unwrap();

        assert_eq!(replay.replayed, 0);
        assert_eq!(state.players[&1].rating, SkillRating::baseline());
        assert_eq!(state.players[&2].rating, SkillRating::baseline());
        assert!(state.adjustments.is_empty());
        assert!(state.snapshots.is_empty());
    }

    #[test]
    fn test_same_day_players_before_cutoff_keep_snapshot_rows() {
        let model = create_model();
        let mut state = generate_state(4);
        push_match(&mut state, 1, 1, 9, &[&[1], &[2]]);
        push_match(&mut state, 2, 1, 18, &[&[3], &[4]]);
        rebuild_all(&mut state, &model).unwrap();

        let player_1 = state.players[&1].rating;
        refresh(&mut state, &model, timestamp(1, 18, 0), &[]).unwrap();

        assert_eq!(state.snapshots.get(1, date(1)), Some(player_1));
        assert_eq!(state.snapshots.get(3, date(1)), Some(state.players[&3].rating));
    }

    #[test]
    fn test_missing_player_is_integrity_error() {
        let model = create_model();
        let mut state = generate_state(2);
        push_match(&mut state, 1, 1, 10, &[&[1], &[2]]);
        state.players.remove(&2);

        let result = refresh(&mut state, &model, timestamp(1, 0, 0), &[]);

        assert!(matches!(result, Err(LeagueError::DataIntegrity(_))));
    }

    #[test]
    fn test_rebuild_all_is_idempotent() {
        let model = create_model();
        let mut state = generate_state(3);
        push_match(&mut state, 1, 1, 10, &[&[1], &[2], &[3]]);
        push_match(&mut state, 2, 2, 10, &[&[2, 3], &[1]]);

        rebuild_all(&mut state, &model).unwrap();
        let first = state.clone();
        rebuild_all(&mut state, &model).unwrap();

        assert_eq!(state, first);
    }
}
