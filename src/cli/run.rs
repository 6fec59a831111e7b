//! Run command implementation.

use super::output::{JsonMatchResult, format_match_text};
use super::{CliError, OutputFormat, clock_seed, load_config};
use duskfall::game::{GameState, Snapshot};
use duskfall::protocol::{Command, encode_preamble, encode_state};
use duskfall::tournament::{
    CommandSource, MatchOptions, RandomCommands, ScriptedCommands, generate_map, run_match,
};
use duskfall::Team;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments of the run command.
#[derive(Debug)]
pub(crate) struct RunArgs {
    pub(crate) seed: Option<u64>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) commands: Option<PathBuf>,
    pub(crate) state: Option<PathBuf>,
    pub(crate) turns: Option<u32>,
    pub(crate) save: Option<PathBuf>,
    pub(crate) format: OutputFormat,
    pub(crate) broadcast: bool,
}

fn read_file(path: &Path, what: &str) -> Result<String, CliError> {
    fs::read_to_string(path)
        .map_err(|e| CliError::new(format!("Failed to read {what} {}: {e}", path.display())))
}

fn load_commands(path: &Path) -> Result<Vec<Vec<Command>>, CliError> {
    let text = read_file(path, "commands")?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::new(format!("Invalid commands file {}: {e}", path.display())))
}

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded, the match aborts or the
/// replay cannot be saved.
pub(crate) fn execute(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    } else if args.config.is_none() {
        config.seed = clock_seed();
    }
    let seed = config.seed;

    let state: GameState = match &args.state {
        Some(path) => Snapshot::from_json(&read_file(path, "state")?)?.restore(config)?,
        None => generate_map(config)?,
    };

    let mut inner: Box<dyn CommandSource> = match &args.commands {
        Some(path) => Box::new(ScriptedCommands::new(load_commands(path)?)),
        None => Box::new(RandomCommands::new(seed)),
    };

    if args.broadcast {
        for line in encode_preamble(Team::A, &state) {
            println!("{line}");
        }
    }
    let broadcast = args.broadcast;
    let mut source = |state: &GameState| {
        if broadcast {
            print!("{}", encode_state(state));
        }
        inner.commands(state)
    };

    let options = MatchOptions {
        max_turns: args.turns,
        check_invariants: false,
        record: args.save.is_some(),
    };
    let result = run_match(state, &mut source, &options)?;

    if let (Some(path), Some(replay)) = (&args.save, &result.replay) {
        replay.save(path)?;
        eprintln!("Replay saved to: {}", path.display());
    }

    match args.format {
        OutputFormat::Text => {
            print!("{}", format_match_text(seed, &result));
        }
        OutputFormat::Json => {
            let json_result = JsonMatchResult::from_match_result(seed, &result);
            let json = serde_json::to_string_pretty(&json_result)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    Ok(())
}
