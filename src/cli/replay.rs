//! Replay command implementation.

use super::CliError;
use duskfall::replay::Replay;
use std::path::Path;

/// Execute the replay command.
///
/// # Errors
///
/// Returns an error if the replay cannot be loaded or does not reproduce.
pub(crate) fn execute(path: &Path) -> Result<(), CliError> {
    let replay = Replay::load(path).map_err(|e| {
        CliError::new(format!("Failed to load replay {}: {e}", path.display()))
    })?;

    let verification = replay.verify()?;
    let method = if verification.against_recording {
        "against recorded snapshots"
    } else {
        "by re-running twice"
    };

    println!(
        "Replay verified: {} turns (seed {}), checked {method}",
        verification.turns, replay.seed
    );
    let state = &verification.final_state;
    match state.status() {
        duskfall::MatchStatus::Finished { winner: Some(team) } => {
            println!("Winner: Team {team} at turn {}", state.turn);
        }
        duskfall::MatchStatus::Finished { winner: None } => {
            println!("Result: Tie at turn {}", state.turn);
        }
        duskfall::MatchStatus::Running => {
            println!("Match still running at turn {}", state.turn);
        }
    }
    let recorded = replay.results.map(|r| r.winner);
    if state.is_game_over() && recorded.is_some_and(|winner| winner != state.leader()) {
        return Err(CliError::new(format!(
            "Recorded winner {recorded:?} does not match replayed winner {:?}",
            state.leader()
        )));
    }

    Ok(())
}
