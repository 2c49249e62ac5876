use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::model::structures::league_match::{Match, MatchId, TimelineKey};

/// Matches in total order: by timestamp, then by ascending id when timestamps
/// collide. The `order` index always mirrors `matches`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Match>", into = "Vec<Match>")]
pub struct Timeline {
    matches: BTreeMap<MatchId, Match>,
    order: BTreeSet<TimelineKey>
}

impl Timeline {
    pub fn new() -> Timeline {
        Timeline::default()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.matches.get(&id)
    }

    pub fn contains(&self, id: MatchId) -> bool {
        self.matches.contains_key(&id)
    }

    pub fn next_id(&self) -> MatchId {
        self.matches.keys().next_back().map_or(1, |id| id + 1)
    }

    /// Inserts a match, replacing any match with the same id.
    pub fn insert(&mut self, m: Match) -> Option<Match> {
        let previous = self.remove(m.id);
        self.order.insert(m.key());
        self.matches.insert(m.id, m);

        previous
    }

    pub fn remove(&mut self, id: MatchId) -> Option<Match> {
        let removed = self.matches.remove(&id)?;
        self.order.remove(&removed.key());

        Some(removed)
    }

    /// All matches in timeline order.
    pub fn iter(&self) -> impl Iterator<Item = &Match> {
        self.order.iter().filter_map(|(_, id)| self.matches.get(id))
    }

    /// Matches with `timestamp >= cutoff`, in timeline order.
    pub fn range_from(&self, cutoff: NaiveDateTime) -> impl Iterator<Item = &Match> {
        self.order
            .range((cutoff, MatchId::MIN)..)
            .filter_map(|(_, id)| self.matches.get(id))
    }

    /// Matches with `timestamp <= end`, in timeline order.
    pub fn range_until(&self, end: NaiveDateTime) -> impl Iterator<Item = &Match> {
        self.order
            .range(..=(end, MatchId::MAX))
            .filter_map(|(_, id)| self.matches.get(id))
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.order.iter().map(|(timestamp, _)| timestamp.date()).collect()
    }
}

impl From<Vec<Match>> for Timeline {
    fn from(matches: Vec<Match>) -> Self {
        let mut timeline = Timeline::new();
        for m in matches {
            timeline.insert(m);
        }

        timeline
    }
}

impl From<Timeline> for Vec<Match> {
    fn from(timeline: Timeline) -> Self {
        let Timeline { mut matches, order } = timeline;
        order.iter().filter_map(|(_, id)| matches.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Timeline;
    use crate::{model::structures::league_match::Match, utils::test_utils::timestamp};

    fn bare_match(id: i32, day: u32, hour: u32) -> Match {
        Match {
            id,
            timestamp: timestamp(day, hour, 0),
            entries: Vec::new()
        }
    }

    #[test]
    fn test_orders_by_timestamp_then_id() {
        let timeline = Timeline::from(vec![
            bare_match(3, 2, 10),
            bare_match(2, 1, 12),
            bare_match(1, 2, 10),
            bare_match(4, 1, 9),
        ]);

        let ids: Vec<i32> = timeline.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_range_from_includes_equal_timestamps() {
        let timeline = Timeline::from(vec![bare_match(1, 1, 10), bare_match(2, 2, 10), bare_match(3, 2, 10)]);

        let ids: Vec<i32> = timeline.range_from(timestamp(2, 10, 0)).map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 3]);

        let ids: Vec<i32> = timeline.range_until(timestamp(2, 10, 0)).map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_replaces_and_reindexes() {
        let mut timeline = Timeline::from(vec![bare_match(1, 1, 10), bare_match(2, 2, 10)]);

        let previous = timeline.insert(bare_match(1, 3, 10));

        assert_eq!(previous.map(|m| m.timestamp), Some(timestamp(1, 10, 0)));
        assert_eq!(timeline.len(), 2);
        let ids: Vec<i32> = timeline.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(timeline.range_from(timestamp(1, 0, 0)).count(), 2);
    }

    #[test]
    fn test_remove_and_next_id() {
        let mut timeline = Timeline::new();
        assert_eq!(timeline.next_id(), 1);

        timeline.insert(bare_match(1, 1, 10));
        timeline.insert(bare_match(5, 1, 11));
        assert_eq!(timeline.next_id(), 6);

        assert!(timeline.remove(5).is_some());
        assert!(timeline.remove(5).is_none());
        assert_eq!(timeline.next_id(), 2);
        assert_eq!(timeline.iter().count(), 1);
    }

    #[test]
    fn test_vec_conversion_keeps_timeline_order() {
        let timeline = Timeline::from(vec![bare_match(2, 3, 10), bare_match(1, 4, 10), bare_match(3, 1, 10)]);

        let matches: Vec<Match> = timeline.into();
        let ids: Vec<i32> = matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
