use crate::model::structures::player::PlayerId;
use serde::{Deserialize, Serialize};

pub type GroupId = i32;

/// The players sharing one outcome in a single match. Every match entry owns
/// a fresh group, even when the same players team up again.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub players: Vec<PlayerId>
}
