use crate::model::structures::{player::PlayerId, skill_rating::SkillRating};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPlayer {
    pub player_id: PlayerId,
    pub name: String,
    pub rating: SkillRating,
    pub rank: i32,
    pub percentile: f64,
    /// Date of the snapshot backing this entry, `None` for live ratings
    pub as_of: Option<NaiveDate>
}
