use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use openskill::model::plackett_luce::PlackettLuce;
use tracing::{info, warn};

use crate::{
    model::{
        constants::MIN_GROUPS_PER_MATCH,
        create_model,
        error::{LeagueError, LeagueResult},
        rankings,
        recalc::{self, Replay},
        state::LeagueState,
        structures::{
            league_match::{Match, MatchId, NewEntry},
            player::{Player, PlayerId},
            ranking::RankedPlayer,
            rating_adjustment::RatingAdjustment,
            skill_rating::SkillRating
        },
        RatingEngine
    },
    utils::time_utils::now_minute
};

/// Result of adding a batch of player names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddedPlayers {
    pub added: Vec<Player>,
    /// Names that already existed (case-insensitive)
    pub skipped: Vec<String>
}

/// The single writer over the league state.
///
/// Every mutation runs against a clone of the current state. Only when the
/// mutation, the recomputation, and the snapshot rebuild all succeed does the
/// clone replace the live state, and the replaced state becomes the undo
/// checkpoint. A failed call leaves everything as it was.
pub struct LeagueStore<E: RatingEngine = PlackettLuce> {
    state: LeagueState,
    checkpoint: Option<LeagueState>,
    engine: E
}

impl Default for LeagueStore<PlackettLuce> {
    fn default() -> Self {
        Self::new(create_model())
    }
}

impl<E: RatingEngine> LeagueStore<E> {
    pub fn new(engine: E) -> LeagueStore<E> {
        LeagueStore {
            state: LeagueState::default(),
            checkpoint: None,
            engine
        }
    }

    /// Wraps previously persisted state. The state is trusted to be consistent.
    pub fn from_parts(state: LeagueState, checkpoint: Option<LeagueState>, engine: E) -> LeagueStore<E> {
        LeagueStore {
            state,
            checkpoint,
            engine
        }
    }

    pub fn state(&self) -> &LeagueState {
        &self.state
    }

    pub fn checkpoint(&self) -> Option<&LeagueState> {
        self.checkpoint.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn transact<T>(&mut self, op: impl FnOnce(&mut LeagueState, &E) -> LeagueResult<T>) -> LeagueResult<T> {
        let mut working = self.state.clone();
        let result = op(&mut working, &self.engine)?;
        self.checkpoint = Some(std::mem::replace(&mut self.state, working));

        Ok(result)
    }

    // Players

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.state.players.get(&id)
    }

    pub fn find_player(&self, name: &str) -> Option<&Player> {
        self.state.find_player(name)
    }

    /// Exact, case-insensitive name lookup.
    pub fn resolve_player(&self, name: &str) -> LeagueResult<PlayerId> {
        self.find_player(name)
            .map(|p| p.id)
            .ok_or_else(|| LeagueError::validation(format!("Player '{}' does not exist.", name.trim())))
    }

    /// Players sorted by name.
    pub fn players(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.state.players.values().collect();
        players.sort_by_key(|p| p.name.to_lowercase());

        players
    }

    /// Registers every new name at the baseline rating. Names that already
    /// exist are skipped; a batch with nothing to add fails.
    pub fn add_players(&mut self, names: &[&str]) -> LeagueResult<AddedPlayers> {
        self.transact(|state, _| {
            let mut outcome = AddedPlayers::default();
            for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
                if state.find_player(name).is_some() {
                    outcome.skipped.push(name.to_string());
                    continue;
                }

                let player = Player::new(state.next_player_id(), name);
                state.players.insert(player.id, player.clone());
                outcome.added.push(player);
            }

            if outcome.added.is_empty() {
                return Err(LeagueError::validation(match outcome.skipped.as_slice() {
                    [] => "No player names given".to_string(),
                    skipped => format!("Players already exist: {}", skipped.join(", "))
                }));
            }

            info!("Registered {} players", outcome.added.len());
            Ok(outcome)
        })
    }

    /// Removes a player. Their historical match records are kept, but any
    /// later recomputation that has to replay those matches fails.
    pub fn delete_player(&mut self, name: &str) -> LeagueResult<Player> {
        self.transact(|state, _| {
            let id = state
                .find_player(name)
                .map(|p| p.id)
                .ok_or_else(|| LeagueError::not_found(format!("Player '{}' not found.", name.trim())))?;

            if state.adjustments.contains_key(&id) {
                warn!(
                    "Player {} still appears in recorded matches; editing those matches will fail",
                    id
                );
            }

            state.adjustments.remove(&id);
            state.snapshots.remove_player(id);
            state
                .players
                .remove(&id)
                .ok_or_else(|| LeagueError::not_found(format!("Player {} not found.", id)))
        })
    }

    pub fn history(&self, id: PlayerId) -> &[RatingAdjustment] {
        self.state.adjustments.get(&id).map(|log| log.as_slice()).unwrap_or(&[])
    }

    // Matches

    pub fn get_match(&self, id: MatchId) -> Option<&Match> {
        self.state.timeline.get(id)
    }

    /// Matches in timeline order.
    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.state.timeline.iter()
    }

    /// Records a match. Without a timestamp the current minute is used.
    pub fn add_match(&mut self, timestamp: Option<NaiveDateTime>, entries: Vec<NewEntry>) -> LeagueResult<MatchId> {
        self.transact(|state, engine| {
            validate_entries(state, &entries)?;

            let id = state.timeline.next_id();
            let timestamp = timestamp.unwrap_or_else(now_minute);
            let entries = state.create_groups(entries);
            state.timeline.insert(Match { id, timestamp, entries });

            recalc::refresh(state, engine, timestamp, &[])?;

            info!("Recorded match {} at {}", id, timestamp);
            Ok(id)
        })
    }

    /// Replaces a match's entries and/or timestamp in place.
    pub fn edit_match(
        &mut self,
        id: MatchId,
        entries: Option<Vec<NewEntry>>,
        timestamp: Option<NaiveDateTime>
    ) -> LeagueResult<()> {
        self.transact(|state, engine| {
            let existing = state
                .timeline
                .get(id)
                .cloned()
                .ok_or_else(|| LeagueError::not_found(format!("No match found with ID {}", id)))?;

            let entries = match entries {
                Some(new_entries) => {
                    validate_entries(state, &new_entries)?;
                    state.remove_groups(&existing.entries);
                    state.create_groups(new_entries)
                }
                None => existing.entries.clone()
            };

            let timestamp = timestamp.unwrap_or(existing.timestamp);
            state.timeline.insert(Match { id, timestamp, entries });

            let cutoff = existing.timestamp.min(timestamp);
            recalc::refresh(state, engine, cutoff, &[existing.date()])?;

            info!("Updated match {}", id);
            Ok(())
        })
    }

    pub fn delete_match(&mut self, id: MatchId) -> LeagueResult<Match> {
        self.transact(|state, engine| {
            let removed = state
                .timeline
                .remove(id)
                .ok_or_else(|| LeagueError::not_found(format!("No match found with ID {}", id)))?;
            state.remove_groups(&removed.entries);

            recalc::refresh(state, engine, removed.timestamp, &[removed.date()])?;

            info!("Deleted match {}", id);
            Ok(removed)
        })
    }

    /// Recomputes everything from the baseline, e.g. after an import.
    pub fn rebuild_all(&mut self) -> LeagueResult<Replay> {
        self.transact(|state, engine| recalc::rebuild_all(state, engine))
    }

    /// Replaces the whole state with imported data and rebuilds it, since
    /// imported ratings carry no consistency guarantee.
    pub fn import(&mut self, imported: LeagueState) -> LeagueResult<Replay> {
        self.transact(|state, engine| {
            *state = imported;
            recalc::rebuild_all(state, engine)
        })
    }

    /// Restores the state from before the last mutation. Returns `false`
    /// when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.checkpoint.take() {
            Some(previous) => {
                self.state = previous;
                true
            }
            None => false
        }
    }

    // Queries

    pub fn rating_as_of(&self, id: PlayerId, date: NaiveDate) -> Option<(NaiveDate, SkillRating)> {
        self.state.snapshots.rating_as_of(id, date)
    }

    pub fn rankings(&self) -> Vec<RankedPlayer> {
        rankings::current(&self.state)
    }

    pub fn rankings_as_of(&self, date: NaiveDate) -> Vec<RankedPlayer> {
        rankings::as_of(&self.state, date)
    }
}

fn validate_entries(state: &LeagueState, entries: &[NewEntry]) -> LeagueResult<()> {
    if entries.len() < MIN_GROUPS_PER_MATCH {
        return Err(LeagueError::validation(format!(
            "A match needs at least {} participants, got {}",
            MIN_GROUPS_PER_MATCH,
            entries.len()
        )));
    }

    let mut seen = BTreeSet::new();
    for entry in entries {
        if entry.players.is_empty() {
            return Err(LeagueError::validation("Teams must have at least one player"));
        }

        for player_id in &entry.players {
            if !state.players.contains_key(player_id) {
                return Err(LeagueError::validation(format!("Player {} does not exist.", player_id)));
            }

            if !seen.insert(*player_id) {
                let name = state.player_names(&[*player_id]).join("");
                return Err(LeagueError::validation(format!(
                    "Player '{}' appears more than once in the match",
                    name
                )));
            }
        }
    }

    Ok(())
}
