//! Duskfall CLI - run, replay and batch-test matches.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Duskfall - a deterministic day/night resource game engine
#[derive(Parser, Debug)]
#[command(name = "duskfall")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single match
    Run {
        /// Random seed (default: the config's seed)
        #[arg(short, long)]
        seed: Option<u64>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON file with one list of commands per turn (default: random bots)
        #[arg(long)]
        commands: Option<PathBuf>,

        /// Start from a JSON snapshot instead of a generated map
        #[arg(long)]
        state: Option<PathBuf>,

        /// Stop after this many turns
        #[arg(short, long)]
        turns: Option<u32>,

        /// Save a replay to file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Print the per-turn state broadcast
        #[arg(short, long)]
        broadcast: bool,
    },

    /// Re-run a replay and verify it is deterministic
    Replay {
        /// Replay file (.json)
        #[arg(required = true)]
        replay: PathBuf,
    },

    /// Run many seeded random matches in parallel, checking invariants every turn
    Batch {
        /// Number of matches to run (default: 100)
        #[arg(short, long, default_value = "100")]
        games: u64,

        /// Starting seed (increments for each match)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Parallel threads (default: CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum turns per match
        #[arg(short = 't', long)]
        max_turns: Option<u32>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Show progress bar
        #[arg(short, long)]
        progress: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            seed,
            config,
            commands,
            state,
            turns,
            save,
            format,
            broadcast,
        } => cli::run::execute(cli::run::RunArgs {
            seed,
            config,
            commands,
            state,
            turns,
            save,
            format,
            broadcast,
        }),

        Commands::Replay { replay } => cli::replay::execute(&replay),

        Commands::Batch {
            games,
            seed,
            threads,
            config,
            max_turns,
            format,
            progress,
        } => cli::batch::execute(cli::batch::BatchArgs {
            games,
            seed,
            threads,
            config,
            max_turns,
            format,
            progress,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
