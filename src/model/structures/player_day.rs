use crate::model::structures::{player::PlayerId, skill_rating::SkillRating};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A player's rating at the end of a day on which they played.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerDaySnapshot {
    pub player_id: PlayerId,
    pub date: NaiveDate,
    pub mu: f64,
    pub sigma: f64
}

impl PlayerDaySnapshot {
    pub fn rating(&self) -> SkillRating {
        SkillRating::new(self.mu, self.sigma)
    }
}
