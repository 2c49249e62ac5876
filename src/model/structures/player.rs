use crate::model::structures::skill_rating::SkillRating;
use serde::{Deserialize, Serialize};

pub type PlayerId = i32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub rating: SkillRating
}

impl Player {
    pub fn new(id: PlayerId, name: &str) -> Player {
        Player {
            id,
            name: name.to_string(),
            rating: SkillRating::baseline()
        }
    }

    /// Display names are unique regardless of case.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}
