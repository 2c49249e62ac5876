use crate::{
    args::{Args, Command, MatchAction, PlayerAction},
    database::{
        db::{DbClient, DbError},
        db_structs::StoredLeague,
        document::{export_json, import_json}
    },
    model::{
        create_model,
        error::LeagueError,
        participants,
        state::LeagueState,
        store::LeagueStore,
        structures::{league_match::Match, ranking::RankedPlayer},
        RatingEngine
    },
    utils::time_utils::{format_date, parse_date, parse_timestamp, timestamp_or_existing}
};
use chrono::Datelike;
use itertools::Itertools;
use std::io::{self, Write};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    League(#[from] LeagueError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error)
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Loads the league, runs one command and persists the result if the
/// command changed anything.
pub fn run(args: &Args) -> CommandResult<()> {
    let mut client = DbClient::open(&args.db_path)?;
    let stored = client.load_all()?;
    let mut store = LeagueStore::from_parts(stored.state, stored.checkpoint, create_model());

    let stdout = io::stdout();
    let changed = execute(&mut store, &args.command, &mut stdout.lock())?;

    if changed {
        client.save_all(&StoredLeague {
            state: store.state().clone(),
            checkpoint: store.checkpoint().cloned()
        })?;
    } else {
        debug!("Nothing changed, skipping save");
    }

    Ok(())
}

/// Runs a command against the store and writes its report to `out`.
/// Returns whether the league changed.
pub fn execute<E: RatingEngine>(
    store: &mut LeagueStore<E>,
    command: &Command,
    out: &mut impl Write
) -> CommandResult<bool> {
    match command {
        Command::Players { action } => match action.as_ref().unwrap_or(&PlayerAction::List) {
            PlayerAction::List => list_players(store, out).map(|_| false),
            PlayerAction::Add { names } => add_players(store, names, out).map(|_| true),
            PlayerAction::Delete { name } => {
                let player = store.delete_player(name)?;
                writeln!(out, "Deleted player '{}'.", player.name)?;
                Ok(true)
            }
            PlayerAction::History { name } => player_history(store, name, out).map(|_| false)
        },
        Command::Matches { action } => match action.as_ref().unwrap_or(&MatchAction::List) {
            MatchAction::List => list_matches(store, out).map(|_| false),
            MatchAction::Add { participants: input, time } => {
                let timestamp = time.as_deref().map(parse_timestamp).transpose()?;
                let entries = participants::resolve(input, store.state())?;
                let id = store.add_match(timestamp, entries)?;

                if let Some(m) = store.get_match(id) {
                    writeln!(out, "Match {} recorded at {}", id, m.timestamp.format("%Y-%m-%d %H:%M"))?;
                }
                Ok(true)
            }
            MatchAction::Edit { id, participants, time } => {
                edit_match(store, *id, participants.as_deref(), time.as_deref(), out).map(|_| true)
            }
            MatchAction::Delete { id } => {
                let removed = store.delete_match(*id)?;
                writeln!(
                    out,
                    "Deleted match {} from {}.",
                    removed.id,
                    removed.timestamp.format("%Y-%m-%d %H:%M")
                )?;
                Ok(true)
            }
        },
        Command::Rankings { date } => {
            let rankings = match date {
                Some(date) => store.rankings_as_of(parse_date(date)?),
                None => store.rankings()
            };
            print_rankings(&rankings, out)?;
            Ok(false)
        }
        Command::RebuildSnapshots => {
            let replay = store.rebuild_all()?;
            writeln!(
                out,
                "Rebuilt ratings from {} matches, {} snapshot rows written.",
                replay.replayed,
                store.state().snapshots.len()
            )?;
            Ok(true)
        }
        Command::Import { path } => {
            let imported = import_json(path)?;
            let replay = store.import(imported)?;
            writeln!(
                out,
                "Imported {} players and {} matches from {}.",
                store.state().players.len(),
                replay.replayed,
                path.display()
            )?;
            Ok(true)
        }
        Command::Export { path } => {
            export_json(store.state(), path)?;
            writeln!(out, "Exported league to {}.", path.display())?;
            Ok(false)
        }
        Command::Undo => {
            if store.undo() {
                writeln!(out, "Reverted the last change.")?;
                Ok(true)
            } else {
                writeln!(out, "Nothing to undo.")?;
                Ok(false)
            }
        }
    }
}

fn list_players<E: RatingEngine>(store: &LeagueStore<E>, out: &mut impl Write) -> CommandResult<()> {
    let players = store.players();
    if players.is_empty() {
        writeln!(out, "No players registered.")?;
    }

    for p in players {
        writeln!(out, "{}: μ={:.2}, σ={:.2}", p.name, p.rating.mu, p.rating.sigma)?;
    }

    Ok(())
}

fn add_players<E: RatingEngine>(store: &mut LeagueStore<E>, names: &[String], out: &mut impl Write) -> CommandResult<()> {
    let names: Vec<&str> = names
        .iter()
        .flat_map(|n| n.split(','))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();

    let outcome = store.add_players(&names)?;
    for player in &outcome.added {
        writeln!(out, "Player '{}' added.", player.name)?;
    }
    for name in &outcome.skipped {
        writeln!(out, "Player '{}' already exists, skipped.", name)?;
    }

    Ok(())
}

fn player_history<E: RatingEngine>(store: &LeagueStore<E>, name: &str, out: &mut impl Write) -> CommandResult<()> {
    let player = store
        .find_player(name)
        .ok_or_else(|| LeagueError::not_found(format!("Player '{}' not found.", name.trim())))?;

    let history = store.history(player.id);
    if history.is_empty() {
        writeln!(out, "{} has no rated matches.", player.name)?;
        return Ok(());
    }

    writeln!(out, "{}:", player.name)?;
    for a in history {
        writeln!(
            out,
            "  {} match {}: μ {:.2} -> {:.2} ({:+.2}), σ {:.2} -> {:.2}",
            a.timestamp.format("%Y-%m-%d %H:%M"),
            a.match_id,
            a.rating_before.mu,
            a.rating_after.mu,
            a.mu_delta(),
            a.rating_before.sigma,
            a.rating_after.sigma
        )?;
    }

    Ok(())
}

fn edit_match<E: RatingEngine>(
    store: &mut LeagueStore<E>,
    id: i32,
    input: Option<&str>,
    time: Option<&str>,
    out: &mut impl Write
) -> CommandResult<()> {
    if input.is_none() && time.is_none() {
        return Err(LeagueError::validation("Nothing to change: give --participants and/or --time").into());
    }

    let existing = store
        .get_match(id)
        .map(|m| m.timestamp)
        .ok_or_else(|| LeagueError::not_found(format!("No match found with ID {}", id)))?;

    let timestamp = time.map(|t| timestamp_or_existing(t, existing));
    let entries = input
        .map(|p| participants::resolve(p, store.state()))
        .transpose()?;

    store.edit_match(id, entries, timestamp)?;
    writeln!(out, "Match {} updated.", id)?;

    Ok(())
}

fn list_matches<E: RatingEngine>(store: &LeagueStore<E>, out: &mut impl Write) -> CommandResult<()> {
    if store.state().timeline.is_empty() {
        writeln!(out, "No matches recorded.")?;
        return Ok(());
    }

    let mut year = None;
    let mut month = None;
    for ((y, mo, d), day_matches) in &store
        .matches()
        .chunk_by(|played| (played.timestamp.year(), played.timestamp.month(), played.timestamp.day()))
    {
        if year != Some(y) {
            writeln!(out, "{}:", y)?;
            year = Some(y);
            month = None;
        }
        if month != Some(mo) {
            writeln!(out, "  {:02}:", mo)?;
            month = Some(mo);
        }

        writeln!(out, "    {:02}:", d)?;
        for played in day_matches {
            writeln!(
                out,
                "      {} : {} -> {}",
                played.timestamp.format("%H:%M"),
                played.id,
                describe_match(store.state(), played)
            )?;
        }
    }

    Ok(())
}

/// `[Alice, Bob] (score: 3) > [Carol] (score: 1)`, best place first, `=` between ties.
pub fn describe_match(state: &LeagueState, m: &Match) -> String {
    let mut entries: Vec<_> = m.entries.iter().collect();
    entries.sort_by_key(|e| e.place);

    let mut description = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            description.push_str(if entries[i - 1].place == entry.place { " = " } else { " > " });
        }

        let players = state
            .groups
            .get(&entry.group_id)
            .map(|g| state.player_names(&g.players))
            .unwrap_or_default();
        description.push_str(&format!("[{}]", players.join(", ")));

        if let Some(score) = entry.score {
            description.push_str(&format!(" (score: {})", score));
        }
    }

    description
}

fn print_rankings(rankings: &[RankedPlayer], out: &mut impl Write) -> CommandResult<()> {
    if rankings.is_empty() {
        writeln!(out, "No rankings available.")?;
    }

    for r in rankings {
        let as_of = r
            .as_of
            .map(|d| format!(" (as of {})", format_date(d)))
            .unwrap_or_default();
        writeln!(
            out,
            "{:>3}. {}: μ={:.2}, σ={:.2}, top {:.1}%{}",
            r.rank,
            r.name,
            r.rating.mu,
            r.rating.sigma,
            100.0 - r.percentile,
            as_of
        )?;
    }

    Ok(())
}
