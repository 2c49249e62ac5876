mod common;

use approx::assert_abs_diff_eq;
use common::{db_path, init_test_env, stored};
use league_rating::{
    args::{Command, MatchAction, PlayerAction},
    commands::execute,
    database::{
        db::{backup_path, DbClient},
        document::{export_json, import_json}
    },
    model::{create_model, store::LeagueStore, structures::skill_rating::SkillRating},
    utils::test_utils::{date, generate_history, generate_store, new_entry, timestamp}
};
use serial_test::serial;
use tempfile::TempDir;

fn reopen(dir: &TempDir) -> LeagueStore {
    let client = DbClient::open(db_path(dir.path())).unwrap();
    let loaded = client.load_all().unwrap();
    LeagueStore::from_parts(loaded.state, loaded.checkpoint, create_model())
}

fn save(dir: &TempDir, store: &LeagueStore) {
    let mut client = DbClient::open(db_path(dir.path())).unwrap();
    client.save_all(&stored(store)).unwrap();
}

#[test]
fn test_reload_restores_identical_league() {
    init_test_env();
    let dir = TempDir::new().unwrap();

    let mut store = generate_store(6);
    for (at, entries) in generate_history(21, 6, 25) {
        store.add_match(Some(at), entries).unwrap();
    }
    save(&dir, &store);

    let reloaded = reopen(&dir);

    assert_eq!(reloaded.state(), store.state());
    assert_eq!(reloaded.checkpoint(), store.checkpoint());
}

#[test]
fn test_save_backs_up_previous_file() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    let path = db_path(dir.path());

    let mut store = generate_store(2);
    save(&dir, &store);
    assert!(path.exists());

    store
        .add_match(Some(timestamp(2, 10, 0)), vec![new_entry(&[1], 1), new_entry(&[2], 2)])
        .unwrap();
    save(&dir, &store);

    let backup = backup_path(&path);
    assert!(backup.exists());

    // The backup holds the league as it was before the second save
    let previous = DbClient::open(&backup).unwrap().load_all().unwrap();
    assert_eq!(previous.state.timeline.len(), 0);
    assert_eq!(previous.state.players.len(), 2);
}

#[test]
fn test_undo_survives_reload() {
    init_test_env();
    let dir = TempDir::new().unwrap();

    let mut store = generate_store(2);
    store
        .add_match(Some(timestamp(2, 10, 0)), vec![new_entry(&[1], 1), new_entry(&[2], 2)])
        .unwrap();
    let after_first = store.state().clone();
    store
        .add_match(Some(timestamp(3, 10, 0)), vec![new_entry(&[2], 1), new_entry(&[1], 2)])
        .unwrap();
    save(&dir, &store);

    let mut reloaded = reopen(&dir);
    assert!(reloaded.undo());
    assert_eq!(reloaded.state(), &after_first);
    save(&dir, &reloaded);

    let mut again = reopen(&dir);
    assert!(again.checkpoint().is_none());
    assert!(!again.undo());
    assert_eq!(again.state(), &after_first);
}

#[test]
fn test_export_then_import_rebuilds_ratings() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    let json = dir.path().join("league.json");

    let mut store = generate_store(5);
    for (at, entries) in generate_history(8, 5, 20) {
        store.add_match(Some(at), entries).unwrap();
    }
    export_json(store.state(), &json).unwrap();

    let mut imported = import_json(&json).unwrap();
    // Ratings in the file are not trusted
    for player in imported.players.values_mut() {
        player.rating = SkillRating::new(0.0, 1.0);
    }

    let mut fresh = LeagueStore::default();
    let replay = fresh.import(imported).unwrap();

    assert_eq!(replay.replayed, 20);
    assert_eq!(fresh.state(), store.state());
}

#[test]
#[serial]
fn test_cli_flow_against_database() {
    init_test_env();
    let dir = TempDir::new().unwrap();

    let run = |command: Command| -> String {
        let mut store = reopen(&dir);
        let mut out = Vec::new();
        let changed = execute(&mut store, &command, &mut out).unwrap();
        if changed {
            save(&dir, &store);
        }
        String::from_utf8(out).unwrap()
    };

    run(Command::Players {
        action: Some(PlayerAction::Add {
            names: vec!["Alice,Bob".to_string(), "Carol".to_string()]
        })
    });
    run(Command::Matches {
        action: Some(MatchAction::Add {
            participants: "Alice, Bob".to_string(),
            time: Some("2024-01-01T10:00".to_string())
        })
    });
    run(Command::Matches {
        action: Some(MatchAction::Add {
            participants: "[Alice], [Bob], [Carol]".to_string(),
            time: Some("2024-01-02T10:00".to_string())
        })
    });
    run(Command::Matches {
        action: Some(MatchAction::Edit {
            id: 1,
            participants: Some("Alice, Bob score:1,1".to_string()),
            time: None
        })
    });

    let store = reopen(&dir);
    let alice = store.resolve_player("alice").unwrap();
    let bob = store.resolve_player("BOB").unwrap();
    assert_abs_diff_eq!(
        store.history(alice)[0].rating_after.mu,
        store.history(bob)[0].rating_after.mu,
        epsilon = 1e-9
    );
    assert!(store.rating_as_of(alice, date(1)).is_some());

    let rankings = run(Command::Rankings { date: None });
    assert_eq!(rankings.lines().count(), 3);
    assert!(rankings.lines().next().unwrap().contains("Alice"));

    let undo = run(Command::Undo);
    assert_eq!(undo, "Reverted the last change.\n");
    let store = reopen(&dir);
    assert!(store.history(alice)[0].rating_after.mu > store.history(bob)[0].rating_after.mu);
}
