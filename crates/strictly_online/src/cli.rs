//! Command-line interface for strictly_online.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Strictly Online - terminal client for real-time tic-tac-toe
#[derive(Parser, Debug)]
#[command(name = "strictly_online")]
#[command(about = "Play tic-tac-toe against other people over a game server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Account email
    #[arg(long, global = true, env = "STRICTLY_EMAIL")]
    pub email: Option<String>,

    /// Account password
    #[arg(long, global = true, env = "STRICTLY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the rooms in the lobby
    Rooms,

    /// Join a game and play from the terminal
    Play(PlayArgs),
}

/// How to pick the room to play in.
#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct PlayArgs {
    /// Join the room with this id
    #[arg(long)]
    pub room: Option<String>,

    /// Let the server pick a room
    #[arg(long)]
    pub random: bool,

    /// Create a room with this name, then join it
    #[arg(long)]
    pub create: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_with_room() {
        let cli = Cli::try_parse_from(["strictly_online", "play", "--room", "r1"]).unwrap();
        match cli.command {
            Command::Play(args) => {
                assert_eq!(args.room.as_deref(), Some("r1"));
                assert!(!args.random);
            }
            Command::Rooms => panic!("expected play"),
        }
    }

    #[test]
    fn test_room_choices_are_exclusive() {
        let parsed = Cli::try_parse_from(["strictly_online", "play", "--room", "r1", "--random"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "strictly_online",
            "rooms",
            "--config",
            "client.toml",
            "--email",
            "a@b.c",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("client.toml")));
        assert_eq!(cli.email.as_deref(), Some("a@b.c"));
        assert!(matches!(cli.command, Command::Rooms));
    }
}
