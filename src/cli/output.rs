//! Output formatting utilities for CLI.

use duskfall::Team;
use duskfall::tournament::{BatchStats, MatchResult};
use serde::Serialize;

/// JSON-serializable match result.
#[derive(Debug, Serialize)]
pub(super) struct JsonMatchResult {
    /// Random seed used.
    seed: u64,
    /// Winning team (null for a tie or an unfinished match).
    winner: Option<Team>,
    /// Whether the match reached its natural end.
    finished: bool,
    /// Turns resolved.
    turns: u32,
    /// City tiles per team.
    city_tiles: [usize; 2],
    /// Units per team.
    units: [usize; 2],
    /// Commands rejected by validation.
    rejected: usize,
    /// Actions that failed during execution.
    errors: usize,
}

impl JsonMatchResult {
    /// Create from a `MatchResult`.
    pub(super) fn from_match_result(seed: u64, result: &MatchResult) -> Self {
        Self {
            seed,
            winner: result.winner,
            finished: result.finished,
            turns: result.turns,
            city_tiles: result.city_tiles,
            units: result.units,
            rejected: result.rejected,
            errors: result.errors,
        }
    }
}

fn winner_line(winner: Option<Team>, finished: bool) -> String {
    match (winner, finished) {
        (Some(team), _) => format!("Team {team}"),
        (None, true) => "Tie".to_string(),
        (None, false) => "None (match unfinished)".to_string(),
    }
}

/// Format a match result as human-readable text.
pub(super) fn format_match_text(seed: u64, result: &MatchResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Match Result (seed: {seed})\n"));
    output.push_str(&format!(
        "  Winner: {}\n",
        winner_line(result.winner, result.finished)
    ));
    output.push_str(&format!("  Turns: {}\n\n", result.turns));

    for team in Team::ALL {
        output.push_str(&format!(
            "  Team {team}: {} city tiles, {} units, {} research points\n",
            result.city_tiles[team.index()],
            result.units[team.index()],
            result.state.registry.team(team).research_points
        ));
    }
    output.push_str(&format!(
        "\n  Rejected commands: {}\n  Failed actions: {}\n",
        result.rejected, result.errors
    ));

    output
}

/// JSON-serializable batch result.
#[derive(Debug, Serialize)]
pub(super) struct JsonBatchResult {
    /// First seed of the batch.
    base_seed: u64,
    /// Matches completed.
    games: u64,
    /// Wins per team.
    wins: [u64; 2],
    /// Ties and unfinished matches.
    ties: u64,
    /// Matches aborted by an error.
    failures: u64,
    /// Average match length in turns.
    avg_turns: f64,
    /// Rejected commands over all matches.
    rejected: u64,
    /// Failed actions over all matches.
    errors: u64,
}

impl JsonBatchResult {
    /// Create from batch stats.
    pub(super) fn from_stats(base_seed: u64, stats: &BatchStats) -> Self {
        Self {
            base_seed,
            games: stats.games,
            wins: stats.wins,
            ties: stats.ties,
            failures: stats.failures,
            avg_turns: stats.average_turns(),
            rejected: stats.rejected,
            errors: stats.errors,
        }
    }
}

/// Format batch stats as human-readable text.
#[allow(clippy::cast_precision_loss)]
pub(super) fn format_batch_text(base_seed: u64, stats: &BatchStats) -> String {
    let mut output = String::new();
    let rate = |n: u64| {
        if stats.games == 0 {
            0.0
        } else {
            n as f64 / stats.games as f64 * 100.0
        }
    };

    output.push_str(&format!(
        "Batch Results ({} games from seed {base_seed})\n",
        stats.games
    ));
    output.push_str("========================================\n\n");
    for team in Team::ALL {
        let wins = stats.wins[team.index()];
        output.push_str(&format!("  Team {team}: {:.1}% ({wins} wins)\n", rate(wins)));
    }
    output.push_str(&format!("  Ties: {} ({:.1}%)\n", stats.ties, rate(stats.ties)));
    output.push_str(&format!("  Failed: {}\n\n", stats.failures));
    output.push_str(&format!(
        "Average Match Length: {:.0} turns\n",
        stats.average_turns()
    ));
    output.push_str(&format!(
        "Rejected commands: {}, failed actions: {}\n",
        stats.rejected, stats.errors
    ));

    output
}
