use crate::model::structures::{league_match::MatchId, player::PlayerId, skill_rating::SkillRating};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One applied match for one player, in replay order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RatingAdjustment {
    pub player_id: PlayerId,
    pub match_id: MatchId,
    pub timestamp: NaiveDateTime,
    pub rating_before: SkillRating,
    pub rating_after: SkillRating
}

impl RatingAdjustment {
    pub fn mu_delta(&self) -> f64 {
        self.rating_after.mu - self.rating_before.mu
    }

    pub fn sigma_delta(&self) -> f64 {
        self.rating_after.sigma - self.rating_before.sigma
    }
}
