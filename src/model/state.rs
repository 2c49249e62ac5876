use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{
    snapshot_tracker::SnapshotTracker,
    structures::{
        group::{Group, GroupId},
        league_match::{MatchEntry, NewEntry},
        player::{Player, PlayerId},
        rating_adjustment::RatingAdjustment
    },
    timeline::Timeline
};

/// Everything the league knows. Cloned wholesale for undo checkpoints and for
/// the working copy of a mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeagueState {
    pub players: BTreeMap<PlayerId, Player>,
    pub groups: BTreeMap<GroupId, Group>,
    pub timeline: Timeline,
    pub snapshots: SnapshotTracker,
    /// Replay log per player, in timeline order
    pub adjustments: BTreeMap<PlayerId, Vec<RatingAdjustment>>
}

impl LeagueState {
    pub fn find_player(&self, name: &str) -> Option<&Player> {
        self.players.values().find(|p| p.is_named(name))
    }

    /// Skips every id still referenced by a recorded match, including those of
    /// deleted players.
    pub fn next_player_id(&self) -> PlayerId {
        let live = self.players.keys().next_back().copied();
        let recorded = self.groups.values().flat_map(|g| g.players.iter().copied()).max();

        live.max(recorded).map_or(1, |id| id + 1)
    }

    fn next_group_id(&self) -> GroupId {
        self.groups.keys().next_back().map_or(1, |id| id + 1)
    }

    /// Creates one fresh group per entry.
    pub fn create_groups(&mut self, entries: Vec<NewEntry>) -> Vec<MatchEntry> {
        let mut created = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.next_group_id();
            self.groups.insert(
                id,
                Group {
                    id,
                    players: entry.players
                }
            );

            created.push(MatchEntry {
                group_id: id,
                place: entry.place,
                score: entry.score
            });
        }

        created
    }

    pub fn remove_groups(&mut self, entries: &[MatchEntry]) {
        for entry in entries {
            self.groups.remove(&entry.group_id);
        }
    }

    /// Player ids of every entry, in entry order. Missing groups are skipped.
    pub fn entry_players(&self, entries: &[MatchEntry]) -> Vec<PlayerId> {
        entries
            .iter()
            .filter_map(|e| self.groups.get(&e.group_id))
            .flat_map(|g| g.players.iter().copied())
            .collect()
    }

    pub fn player_names(&self, ids: &[PlayerId]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.players
                    .get(id)
                    .map_or_else(|| format!("<deleted #{}>", id), |p| p.name.clone())
            })
            .collect()
    }
}
