use crate::model::constants::{MU, SIGMA};
use serde::{Deserialize, Serialize};

/// A (mean, uncertainty) pair. Kept separate from the engine's own rating type
/// so that stored data does not depend on the engine crate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SkillRating {
    pub mu: f64,
    pub sigma: f64
}

impl SkillRating {
    pub fn new(mu: f64, sigma: f64) -> SkillRating {
        SkillRating { mu, sigma }
    }

    /// The prior every new or fully reset player starts from.
    pub fn baseline() -> SkillRating {
        SkillRating { mu: MU, sigma: SIGMA }
    }
}

impl Default for SkillRating {
    fn default() -> Self {
        Self::baseline()
    }
}

#[cfg(test)]
mod tests {
    use super::SkillRating;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_baseline() {
        let baseline = SkillRating::baseline();

        assert_abs_diff_eq!(baseline.mu, 25.0);
        assert_abs_diff_eq!(baseline.sigma, 8.3333, epsilon = 0.0001);
        assert_eq!(SkillRating::default(), baseline);
    }
}
