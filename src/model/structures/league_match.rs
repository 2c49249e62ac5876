use crate::model::structures::{group::GroupId, player::PlayerId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub type MatchId = i32;

/// Position of a match on the timeline. Matches sharing a timestamp are
/// ordered by ascending id.
pub type TimelineKey = (NaiveDateTime, MatchId);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MatchEntry {
    pub group_id: GroupId,
    /// Lower is better, equal places are a tie
    pub place: u32,
    pub score: Option<i64>
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Match {
    pub id: MatchId,
    pub timestamp: NaiveDateTime,
    pub entries: Vec<MatchEntry>
}

impl Match {
    pub fn key(&self) -> TimelineKey {
        (self.timestamp, self.id)
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// A match entry before its group has been created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub players: Vec<PlayerId>,
    pub place: u32,
    pub score: Option<i64>
}
