//! Match runner for duskfall games.
//!
//! Provides a pure function interface: `(state, command source) -> MatchResult`
//!
//! The runner handles:
//! - Deterministic map generation
//! - Pulling each turn's commands from a [`CommandSource`]
//! - Resolving turns until the match ends or a turn limit is hit
//! - Optional invariant checks and replay recording
//! - Parallel batches of seeded random matches with rayon

mod mapgen;

pub use mapgen::{MIN_MAP_WIDTH, generate_map, start_position};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::GameConfig;
use crate::error::MatchError;
use crate::game::{
    Actionable, Direction, GameState, MatchStatus, Snapshot, Team, check_invariants, resolve_turn,
};
use crate::protocol::Command;
use crate::replay::Replay;

/// Supplies the commands of both teams for each turn.
pub trait CommandSource {
    /// Commands for the turn about to be resolved.
    fn commands(&mut self, state: &GameState) -> Vec<Command>;
}

impl<F> CommandSource for F
where
    F: FnMut(&GameState) -> Vec<Command>,
{
    fn commands(&mut self, state: &GameState) -> Vec<Command> {
        self(state)
    }
}

/// Pre-recorded commands, one list per turn. Turns past the end get none.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCommands {
    turns: Vec<Vec<Command>>,
    next: usize,
}

impl ScriptedCommands {
    /// Play back the given turns in order.
    #[must_use]
    pub const fn new(turns: Vec<Vec<Command>>) -> Self {
        Self { turns, next: 0 }
    }
}

impl CommandSource for ScriptedCommands {
    fn commands(&mut self, _state: &GameState) -> Vec<Command> {
        let commands = self.turns.get(self.next).cloned().unwrap_or_default();
        self.next += 1;
        commands
    }
}

/// Seeded random bot for both teams.
///
/// Mostly issues legal-looking orders to every actor that can act, with the
/// occasional malformed command to keep the rejection path busy.
#[derive(Debug, Clone)]
pub struct RandomCommands {
    rng: ChaCha8Rng,
}

impl RandomCommands {
    /// Create a bot driven by `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl CommandSource for RandomCommands {
    fn commands(&mut self, state: &GameState) -> Vec<Command> {
        let mut out = Vec::new();
        let build_cost = state.params().city_build_cost;

        for unit in state.registry.units() {
            if !unit.can_act() {
                continue;
            }
            if unit.is_worker() && unit.cargo.total() >= build_cost && self.rng.gen_bool(0.5) {
                out.push(Command::new(unit.team, format!("bcity {}", unit.id)));
                continue;
            }
            let text = match self.rng.gen_range(0..20u32) {
                0..=11 => {
                    let direction = Direction::CARDINAL[self.rng.gen_range(0..4)];
                    format!("m {} {}", unit.id, direction.as_str())
                }
                12 | 13 if unit.is_worker() => format!("bcity {}", unit.id),
                14 if unit.is_worker() => format!("p {}", unit.id),
                15 => {
                    let mates: Vec<_> = state.registry.team(unit.team).units.keys().collect();
                    let mate = mates[self.rng.gen_range(0..mates.len())];
                    format!("t {} {mate} wood {}", unit.id, self.rng.gen_range(1..=50))
                }
                16 => format!("m {} x", unit.id),
                _ => continue,
            };
            out.push(Command::new(unit.team, text));
        }

        for (pos, tile) in &state.registry.city_tiles {
            if !tile.can_act() {
                continue;
            }
            let verb = match self.rng.gen_range(0..4u32) {
                0 => "bw",
                1 => "bc",
                2 => "r",
                _ => continue,
            };
            out.push(Command::new(tile.team, format!("{verb} {} {}", pos.x, pos.y)));
        }

        out
    }
}

/// How a match is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Stop after this many turns even if the match is not over.
    pub max_turns: Option<u32>,
    /// Check every invariant after every turn.
    pub check_invariants: bool,
    /// Keep a [`Replay`] of the match.
    pub record: bool,
}

/// Final result of a match.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Winning team; `None` for a tie or an unfinished match.
    pub winner: Option<Team>,
    /// Whether the match reached its natural end.
    pub finished: bool,
    /// Turns resolved by this run.
    pub turns: u32,
    /// Commands rejected by validation, over all turns.
    pub rejected: usize,
    /// Actions that failed during execution, over all turns.
    pub errors: usize,
    /// City tiles per team at the end, indexed by [`Team::index`].
    pub city_tiles: [usize; 2],
    /// Units per team at the end, indexed by [`Team::index`].
    pub units: [usize; 2],
    /// Final state.
    pub state: GameState,
    /// Recording, when requested.
    pub replay: Option<Replay>,
}

/// Run a match from `state` until it ends or the turn limit is reached.
///
/// # Errors
///
/// Returns an error if invariant checking is enabled and a turn breaks one.
pub fn run_match<S>(
    mut state: GameState,
    source: &mut S,
    options: &MatchOptions,
) -> Result<MatchResult, MatchError>
where
    S: CommandSource + ?Sized,
{
    let mut replay = options
        .record
        .then(|| Replay::new(state.config, Some(Snapshot::capture(&state))));
    let mut turns = 0;
    let mut rejected = 0;
    let mut errors = 0;

    debug!(seed = state.config.seed, turn = state.turn, "match starting");
    while state.status() == MatchStatus::Running
        && options.max_turns.is_none_or(|limit| turns < limit)
    {
        let commands = source.commands(&state);
        let outcome = resolve_turn(&mut state, &commands);
        turns += 1;
        rejected += outcome.report.rejected.len();
        errors += outcome.report.errors.len();

        if options.check_invariants {
            let violations = check_invariants(&state);
            if !violations.is_empty() {
                let message = violations
                    .iter()
                    .map(|v| v.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(MatchError::Invariant {
                    turn: outcome.report.turn,
                    message,
                });
            }
        }

        if let Some(replay) = replay.as_mut() {
            replay.record_turn(commands, outcome.snapshot);
        }
    }

    let status = state.status();
    if let Some(replay) = replay.as_mut() {
        replay.finish(status, state.turn);
    }
    let (winner, finished) = match status {
        MatchStatus::Finished { winner } => (winner, true),
        MatchStatus::Running => (None, false),
    };

    Ok(MatchResult {
        winner,
        finished,
        turns,
        rejected,
        errors,
        city_tiles: Team::ALL.map(|t| state.city_tile_count(t)),
        units: Team::ALL.map(|t| state.unit_count(t)),
        state,
        replay,
    })
}

/// Generate a map from `config` and play it with [`RandomCommands`] seeded
/// from the same seed.
///
/// # Errors
///
/// Returns an error if the map cannot be generated or a checked invariant
/// breaks.
pub fn run_seeded_match(config: GameConfig, options: &MatchOptions) -> Result<MatchResult, MatchError> {
    let mut source = RandomCommands::new(config.seed);
    let state = generate_map(config)?;
    run_match(state, &mut source, options)
}

/// Aggregate statistics over many matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Matches completed without error.
    pub games: u64,
    /// Wins per team, indexed by [`Team::index`].
    pub wins: [u64; 2],
    /// Matches ending in a tie or cut off by the turn limit.
    pub ties: u64,
    /// Matches aborted by an error.
    pub failures: u64,
    /// Turns resolved over all completed matches.
    pub total_turns: u64,
    /// Rejected commands over all completed matches.
    pub rejected: u64,
    /// Failed actions over all completed matches.
    pub errors: u64,
}

impl BatchStats {
    /// Fold one match result in.
    pub fn add_result(&mut self, result: &MatchResult) {
        self.games += 1;
        match result.winner {
            Some(team) => self.wins[team.index()] += 1,
            None => self.ties += 1,
        }
        self.total_turns += u64::from(result.turns);
        self.rejected += result.rejected as u64;
        self.errors += result.errors as u64;
    }

    /// Merge another accumulator into this one.
    pub fn merge(&mut self, other: &Self) {
        self.games += other.games;
        self.wins[0] += other.wins[0];
        self.wins[1] += other.wins[1];
        self.ties += other.ties;
        self.failures += other.failures;
        self.total_turns += other.total_turns;
        self.rejected += other.rejected;
        self.errors += other.errors;
    }

    /// Mean match length in turns.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_turns(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_turns as f64 / self.games as f64
        }
    }
}

/// Run `games` seeded random matches in parallel.
///
/// Match `i` uses seed `base_seed + i`; everything else comes from
/// `config`. `on_done` is called once per finished match, from whichever
/// worker thread ran it.
pub fn run_batch<F>(
    config: &GameConfig,
    base_seed: u64,
    games: u64,
    options: &MatchOptions,
    on_done: F,
) -> BatchStats
where
    F: Fn() + Sync,
{
    (0..games)
        .into_par_iter()
        .fold(BatchStats::default, |mut stats, i| {
            let seed = base_seed.wrapping_add(i);
            let match_config = GameConfig {
                seed,
                ..*config
            };
            match run_seeded_match(match_config, options) {
                Ok(result) => stats.add_result(&result),
                Err(e) => {
                    warn!(seed, error = %e, "match aborted");
                    stats.failures += 1;
                }
            }
            on_done();
            stats
        })
        .reduce(BatchStats::default, |mut a, b| {
            a.merge(&b);
            a
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn small_config(seed: u64) -> GameConfig {
        let mut config = GameConfig {
            width: 12,
            height: 12,
            seed,
            ..GameConfig::default()
        };
        config.parameters.max_days = 80;
        config
    }

    fn checked() -> MatchOptions {
        MatchOptions {
            check_invariants: true,
            ..MatchOptions::default()
        }
    }

    #[test]
    fn test_idle_match_freezes_on_first_night() {
        let state = generate_map(small_config(5)).unwrap();
        let mut idle = |_: &GameState| Vec::<Command>::new();
        let result = run_match(state, &mut idle, &checked()).unwrap();
        assert!(result.finished);
        assert_eq!(result.turns, 31);
        assert_eq!(result.winner, None);
        assert_eq!(result.city_tiles, [0, 0]);
        assert_eq!(result.units, [0, 0]);
    }

    #[test]
    fn test_turn_limit() {
        let options = MatchOptions {
            max_turns: Some(5),
            ..checked()
        };
        let result = run_seeded_match(small_config(1), &options).unwrap();
        assert!(!result.finished);
        assert_eq!(result.turns, 5);
        assert_eq!(result.state.turn, 5);
        assert_eq!(result.winner, None);
    }

    #[test]
    fn test_random_matches_keep_invariants() {
        for seed in 0..4 {
            let result = run_seeded_match(small_config(seed), &checked()).unwrap();
            assert!(result.finished);
            assert!(result.turns <= 80);
            assert!(result.rejected > 0);
        }
    }

    #[test]
    fn test_seeded_match_is_deterministic() {
        let a = run_seeded_match(small_config(17), &MatchOptions::default()).unwrap();
        let b = run_seeded_match(small_config(17), &MatchOptions::default()).unwrap();
        assert_eq!(a.turns, b.turns);
        assert_eq!(a.winner, b.winner);
        assert_eq!(Snapshot::capture(&a.state), Snapshot::capture(&b.state));
    }

    #[test]
    fn test_recorded_match_verifies() {
        let mut config = small_config(23);
        config.stateful_replay = true;
        let options = MatchOptions {
            max_turns: Some(40),
            record: true,
            ..MatchOptions::default()
        };
        let result = run_seeded_match(config, &options).unwrap();
        let replay = result.replay.unwrap();
        assert_eq!(replay.turns(), result.turns as usize);
        let verification = replay.verify().unwrap();
        assert_eq!(
            Snapshot::capture(&verification.final_state),
            Snapshot::capture(&result.state)
        );
    }

    #[test]
    fn test_scripted_commands_run_out() {
        let mut source = ScriptedCommands::new(vec![vec![Command::new(Team::A, "m u_1 n")]]);
        let state = generate_map(small_config(0)).unwrap();
        assert_eq!(source.commands(&state).len(), 1);
        assert!(source.commands(&state).is_empty());
    }

    #[test]
    fn test_batch_counts_every_game() {
        let done = AtomicU64::new(0);
        let options = MatchOptions {
            max_turns: Some(20),
            ..checked()
        };
        let stats = run_batch(&small_config(0), 100, 6, &options, || {
            done.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(done.load(Ordering::Relaxed), 6);
        assert_eq!(stats.games, 6);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.wins[0] + stats.wins[1] + stats.ties, 6);
        assert!(stats.average_turns() <= 20.0);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = BatchStats {
            games: 2,
            wins: [1, 0],
            ties: 1,
            total_turns: 100,
            ..BatchStats::default()
        };
        let b = BatchStats {
            games: 1,
            wins: [0, 1],
            failures: 2,
            total_turns: 50,
            ..BatchStats::default()
        };
        a.merge(&b);
        assert_eq!(a.games, 3);
        assert_eq!(a.wins, [1, 1]);
        assert_eq!(a.failures, 2);
        assert!((a.average_turns() - 50.0).abs() < f64::EPSILON);
    }
}
