use league_rating::{database::db_structs::StoredLeague, model::store::LeagueStore};
use std::{
    path::{Path, PathBuf},
    sync::Once
};

static INIT: Once = Once::new();

/// Initialize test environment with RUST_LOG=WARN
pub fn init_test_env() {
    INIT.call_once(|| {
        std::env::set_var("RUST_LOG", "warn");
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn db_path(dir: &Path) -> PathBuf {
    dir.join("league.db")
}

pub fn stored(store: &LeagueStore) -> StoredLeague {
    StoredLeague {
        state: store.state().clone(),
        checkpoint: store.checkpoint().cloned()
    }
}
