use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::structures::{player::PlayerId, player_day::PlayerDaySnapshot, skill_rating::SkillRating};

/// End-of-day ratings produced by a replay, keyed by date and player.
pub type DayRatings = BTreeMap<NaiveDate, BTreeMap<PlayerId, SkillRating>>;

/// Sparse per-(player, day) rating table.
///
/// Rows only exist for days on which the player took part in a match, so
/// point queries look for the latest row at or before the requested date.
/// `dates` indexes the same rows by day so that invalidating a day does not
/// scan every player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PlayerDaySnapshot>", into = "Vec<PlayerDaySnapshot>")]
pub struct SnapshotTracker {
    rows: BTreeMap<(PlayerId, NaiveDate), SkillRating>,
    dates: BTreeMap<NaiveDate, BTreeSet<PlayerId>>
}

impl SnapshotTracker {
    pub fn new() -> SnapshotTracker {
        SnapshotTracker::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&mut self, player_id: PlayerId, date: NaiveDate, rating: SkillRating) {
        self.rows.insert((player_id, date), rating);
        self.dates.entry(date).or_default().insert(player_id);
    }

    /// Deletes every row on exactly the given dates. Returns the number of rows removed.
    pub fn clear_dates<'a>(&mut self, dates: impl IntoIterator<Item = &'a NaiveDate>) -> usize {
        let mut removed = 0;
        for date in dates {
            if let Some(players) = self.dates.remove(date) {
                for player_id in players {
                    if self.rows.remove(&(player_id, *date)).is_some() {
                        removed += 1;
                    }
                }
            }
        }

        removed
    }

    /// Replaces the rows of `dates` with the end-of-day ratings of a replay.
    /// Dates without replayed ratings are left empty.
    pub fn materialize(&mut self, dates: &BTreeSet<NaiveDate>, day_ratings: &DayRatings) {
        let removed = self.clear_dates(dates);

        let mut written = 0;
        for date in dates {
            if let Some(ratings) = day_ratings.get(date) {
                for (player_id, rating) in ratings {
                    self.record(*player_id, *date, *rating);
                    written += 1;
                }
            }
        }

        debug!(
            "Materialized {} dates: removed {} rows, wrote {} rows",
            dates.len(),
            removed,
            written
        );
    }

    /// The latest snapshot on or before `date`, or `None` when the player has
    /// no history by then.
    pub fn rating_as_of(&self, player_id: PlayerId, date: NaiveDate) -> Option<(NaiveDate, SkillRating)> {
        self.rows
            .range((player_id, NaiveDate::MIN)..=(player_id, date))
            .next_back()
            .map(|((_, day), rating)| (*day, *rating))
    }

    pub fn get(&self, player_id: PlayerId, date: NaiveDate) -> Option<SkillRating> {
        self.rows.get(&(player_id, date)).copied()
    }

    pub fn remove_player(&mut self, player_id: PlayerId) {
        let days: Vec<NaiveDate> = self
            .rows
            .range((player_id, NaiveDate::MIN)..=(player_id, NaiveDate::MAX))
            .map(|((_, day), _)| *day)
            .collect();

        for day in days {
            self.rows.remove(&(player_id, day));
            if let Some(players) = self.dates.get_mut(&day) {
                players.remove(&player_id);
                if players.is_empty() {
                    self.dates.remove(&day);
                }
            }
        }
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.keys()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.dates.clear();
    }

    /// Rows ordered by date, then player.
    pub fn rows(&self) -> Vec<PlayerDaySnapshot> {
        self.dates
            .iter()
            .flat_map(|(date, players)| players.iter().map(move |player_id| (*player_id, *date)))
            .filter_map(|(player_id, date)| {
                self.get(player_id, date).map(|rating| PlayerDaySnapshot {
                    player_id,
                    date,
                    mu: rating.mu,
                    sigma: rating.sigma
                })
            })
            .collect()
    }
}

impl From<Vec<PlayerDaySnapshot>> for SnapshotTracker {
    fn from(rows: Vec<PlayerDaySnapshot>) -> Self {
        let mut tracker = SnapshotTracker::new();
        for row in rows {
            tracker.record(row.player_id, row.date, row.rating());
        }

        tracker
    }
}

impl From<SnapshotTracker> for Vec<PlayerDaySnapshot> {
    fn from(tracker: SnapshotTracker) -> Self {
        tracker.rows()
    }
}
