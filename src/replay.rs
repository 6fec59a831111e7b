//! Replay records for deterministic re-execution.
//!
//! A replay stores the config (and so the seed), every turn's commands and,
//! optionally, the state after every turn. Since turns are deterministic,
//! re-running the commands from the initial state must reproduce the same
//! snapshots; [`Replay::verify`] checks exactly that.
//!
//! # File Format
//!
//! ```json
//! {"seed": 42, "config": {...}, "commands": [[{"agentID": 0, "command": "m u_1 n"}]],
//!  "stateful": [...], "initial": {...}, "results": {"winner": 0, "turns": 360}}
//! ```
//!
//! `stateful`, `initial` and `results` are optional. Without `initial` the
//! starting state is regenerated from the config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GameConfig;
use crate::error::ReplayError;
use crate::game::{GameState, MatchStatus, Snapshot, Team, resolve_turn};
use crate::protocol::Command;
use crate::tournament::generate_map;

/// How the recorded match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResults {
    /// Winning team, `None` for a tie or an unfinished match.
    pub winner: Option<Team>,
    /// Number of turns played.
    pub turns: u32,
}

/// A recorded match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    /// Seed the match was generated from.
    pub seed: u64,
    /// Match configuration.
    pub config: GameConfig,
    /// Commands of both teams, one list per turn.
    pub commands: Vec<Vec<Command>>,
    /// State after every turn, when stateful replays were enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful: Option<Vec<Snapshot>>,
    /// Starting state, when the match did not start from a generated map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<Snapshot>,
    /// Outcome, once the match is over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ReplayResults>,
}

/// Result of a successful [`Replay::verify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    /// Turns re-run.
    pub turns: usize,
    /// Whether each turn was compared against recorded snapshots rather
    /// than against a second independent run.
    pub against_recording: bool,
    /// State after the last turn.
    pub final_state: GameState,
}

impl Replay {
    /// Start recording a match.
    ///
    /// Per-turn snapshots are kept when `config.stateful_replay` is set.
    #[must_use]
    pub fn new(config: GameConfig, initial: Option<Snapshot>) -> Self {
        Self {
            seed: config.seed,
            stateful: config.stateful_replay.then(Vec::new),
            config,
            commands: Vec::new(),
            initial,
            results: None,
        }
    }

    /// Append one turn.
    ///
    /// The snapshot is dropped unless this replay is stateful.
    pub fn record_turn(&mut self, commands: Vec<Command>, snapshot: Option<Snapshot>) {
        self.commands.push(commands);
        if let (Some(list), Some(snapshot)) = (self.stateful.as_mut(), snapshot) {
            list.push(snapshot);
        }
    }

    /// Record how the match ended.
    pub fn finish(&mut self, status: MatchStatus, turns: u32) {
        let winner = match status {
            MatchStatus::Finished { winner } => winner,
            MatchStatus::Running => None,
        };
        self.results = Some(ReplayResults { winner, turns });
    }

    /// Number of recorded turns.
    #[must_use]
    pub fn turns(&self) -> usize {
        self.commands.len()
    }

    /// Save to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ReplayError> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(|source| ReplayError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Build the state the match started from.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial snapshot cannot be restored or the
    /// map cannot be generated.
    pub fn initial_state(&self) -> Result<GameState, ReplayError> {
        self.config.validate()?;
        match &self.initial {
            Some(snapshot) => Ok(snapshot.restore(self.config)?),
            None => Ok(generate_map(self.config)?),
        }
    }

    /// Re-run every turn and check the states agree.
    ///
    /// Stateful replays are compared turn by turn against the recorded
    /// snapshots. Otherwise the commands are run twice from fresh initial
    /// states and the two runs are compared.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Diverged`] naming the first turn whose
    /// resulting state differs, or an error if the replay is unusable.
    pub fn verify(&self) -> Result<Verification, ReplayError> {
        if let Some(list) = &self.stateful {
            if list.len() != self.commands.len() {
                return Err(ReplayError::LengthMismatch {
                    commands: self.commands.len(),
                    snapshots: list.len(),
                });
            }
        }

        let mut state = self.initial_state()?;
        let mut twin = match self.stateful {
            Some(_) => None,
            None => Some(self.initial_state()?),
        };

        for (index, commands) in self.commands.iter().enumerate() {
            let turn = resolve_turn(&mut state, commands).report.turn;
            let actual = Snapshot::capture(&state).to_json()?;
            let expected = match (&self.stateful, twin.as_mut()) {
                (Some(list), _) => list.get(index).map(Snapshot::to_json).transpose()?,
                (None, Some(twin)) => {
                    resolve_turn(twin, commands);
                    Some(Snapshot::capture(twin).to_json()?)
                }
                (None, None) => None,
            };
            if expected.as_deref() != Some(actual.as_str()) {
                return Err(ReplayError::Diverged { turn });
            }
            debug!(turn, "replay turn verified");
        }

        Ok(Verification {
            turns: self.commands.len(),
            against_recording: self.stateful.is_some(),
            final_state: state,
        })
    }
}
