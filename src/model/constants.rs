// Model constants
pub const MU: f64 = 25.0;
pub const SIGMA: f64 = MU / 3.0;
pub const BETA: f64 = SIGMA / 2.0;
pub const KAPPA: f64 = 0.0001;
// Match shape
pub const FIRST_PLACE: u32 = 1;
pub const MIN_GROUPS_PER_MATCH: usize = 2;
