pub mod group;
pub mod league_match;
pub mod player;
pub mod player_day;
pub mod rating_adjustment;
pub mod ranking;
pub mod skill_rating;
