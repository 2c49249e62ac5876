use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(
    display_name = "League Rating",
    about = "Rating league with history-consistent recomputation",
    long_about = "Tracks players and matches of a small league and keeps every rating and daily \
    snapshot consistent with the full match history, even after edits and deletions"
)]
pub struct Args {
    /// Path of the SQLite database file. Created if missing.
    #[arg(
        short,
        long,
        env = "LEAGUE_DB_PATH",
        default_value = "league.db",
        help = "SQLite database file"
    )]
    pub db_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "RUST_LOG",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"],
        help = "Sets the logging verbosity"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Command {
    /// Manage players (lists them by default)
    Players {
        #[command(subcommand)]
        action: Option<PlayerAction>
    },

    /// Manage matches (lists them by default)
    Matches {
        #[command(subcommand)]
        action: Option<MatchAction>
    },

    /// Show the leaderboard, optionally as it stood at the end of a day
    Rankings {
        /// Date formatted as YYYY-MM-DD
        #[arg(long)]
        date: Option<String>
    },

    /// Recompute every rating and snapshot from scratch
    RebuildSnapshots,

    /// Replace the league with the contents of a JSON export
    Import {
        #[arg(default_value = "league.json")]
        path: PathBuf
    },

    /// Write the league to a JSON file
    Export {
        #[arg(default_value = "league.json")]
        path: PathBuf
    },

    /// Revert the last change
    Undo
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum PlayerAction {
    List,

    /// Add players. Several names can be given separated by commas.
    Add {
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>
    },

    Delete {
        name: String
    },

    /// Show how a player's rating moved match by match
    History {
        name: String
    }
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum MatchAction {
    List,

    /// Record a match, e.g. `"[Alice, Bob], [Carol, Dan] score:3,1"`
    Add {
        participants: String,

        /// When the match was played (YYYY-MM-DDTHH:MM). Defaults to now.
        #[arg(short, long)]
        time: Option<String>
    },

    /// Replace a match's participants and/or time
    Edit {
        id: i32,

        #[arg(short, long)]
        participants: Option<String>,

        #[arg(short, long)]
        time: Option<String>
    },

    Delete {
        id: i32
    }
}

#[cfg(test)]
mod tests {
    use super::{Args, Command, MatchAction, PlayerAction};
    use clap::Parser;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("league").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_actions() {
        assert_eq!(parse(&["players"]).command, Command::Players { action: None });
        assert_eq!(parse(&["matches"]).command, Command::Matches { action: None });
    }

    #[test]
    fn test_match_add() {
        let args = parse(&["--db-path", "x.db", "matches", "add", "Alice, Bob", "--time", "2024-01-02T10:00"]);

        assert_eq!(args.db_path.to_str(), Some("x.db"));
        assert_eq!(
            args.command,
            Command::Matches {
                action: Some(MatchAction::Add {
                    participants: "Alice, Bob".to_string(),
                    time: Some("2024-01-02T10:00".to_string())
                })
            }
        );
    }

    #[test]
    fn test_players_add_many() {
        let args = parse(&["players", "add", "Alice", "Bob,Carol"]);

        assert_eq!(
            args.command,
            Command::Players {
                action: Some(PlayerAction::Add {
                    names: vec!["Alice".to_string(), "Bob,Carol".to_string()]
                })
            }
        );
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let result = Args::try_parse_from(["league", "--log-level", "loud", "undo"]);
        assert!(result.is_err());
    }
}
