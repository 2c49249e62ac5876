use openskill::{
    model::{model::Model, plackett_luce::PlackettLuce},
    rating::{default_gamma, Rating}
};

use crate::model::structures::skill_rating::SkillRating;

pub mod constants;
pub mod error;
pub mod participants;
pub mod rankings;
pub mod recalc;
pub mod snapshot_tracker;
pub mod state;
pub mod store;
pub mod structures;
pub mod timeline;

/// The statistical update applied to a single match.
///
/// `groups[i][j]` is the rating of the j-th player of the i-th group and
/// `ranks[i]` that group's place (lower is better, equal is a tie). The
/// result must have exactly the same shape as `groups`. Implementations are
/// pure and know nothing about time.
pub trait RatingEngine {
    fn update(&self, groups: &[Vec<SkillRating>], ranks: &[u32]) -> Vec<Vec<SkillRating>>;
}

pub fn create_model() -> PlackettLuce {
    PlackettLuce::new(constants::BETA, constants::KAPPA, default_gamma)
}

impl RatingEngine for PlackettLuce {
    fn update(&self, groups: &[Vec<SkillRating>], ranks: &[u32]) -> Vec<Vec<SkillRating>> {
        let teams: Vec<Vec<Rating>> = groups
            .iter()
            .map(|g| {
                g.iter()
                    .map(|r| Rating {
                        mu: r.mu,
                        sigma: r.sigma
                    })
                    .collect()
            })
            .collect();
        let ranks: Vec<usize> = ranks.iter().map(|r| *r as usize).collect();

        self.rate(teams, ranks)
            .into_iter()
            .map(|team| team.into_iter().map(|r| SkillRating::new(r.mu, r.sigma)).collect())
            .collect()
    }
}
