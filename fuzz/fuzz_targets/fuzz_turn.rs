#![no_main]

//! Full turn fuzzer.
//!
//! Feeds structured and free-form command lines for both teams through
//! `resolve_turn` on a generated map:
//! 1. Validation of arbitrary text
//! 2. Movement, city and unit actions
//! 3. Distribution, deposits, night and cleanup
//!
//! Invariants are checked after every turn.

use arbitrary::Arbitrary;
use duskfall::config::GameConfig;
use duskfall::game::{Direction, ResourceType, Team, check_invariants, resolve_turn};
use duskfall::protocol::Command;
use duskfall::tournament::generate_map;
use libfuzzer_sys::fuzz_target;

/// A fuzzer-generated command.
#[derive(Arbitrary, Debug, Clone)]
enum FuzzCommand {
    Move { unit: u8, direction: u8 },
    Transfer { src: u8, dst: u8, resource: u8, amount: u16 },
    BuildWorker { x: u8, y: u8 },
    BuildCart { x: u8, y: u8 },
    Research { x: u8, y: u8 },
    BuildCity { unit: u8 },
    Pillage { unit: u8 },
    Raw(String),
}

impl FuzzCommand {
    fn text(&self) -> String {
        match self {
            Self::Move { unit, direction } => {
                let dir = match direction % 5 {
                    4 => Direction::Center,
                    d => Direction::CARDINAL[usize::from(d)],
                };
                format!("m u_{unit} {}", dir.as_str())
            }
            Self::Transfer { src, dst, resource, amount } => {
                let resource = ResourceType::ALL[usize::from(resource % 3)];
                format!("t u_{src} u_{dst} {resource} {amount}")
            }
            Self::BuildWorker { x, y } => format!("bw {} {}", x % 16, y % 16),
            Self::BuildCart { x, y } => format!("bc {} {}", x % 16, y % 16),
            Self::Research { x, y } => format!("r {} {}", x % 16, y % 16),
            Self::BuildCity { unit } => format!("bcity u_{unit}"),
            Self::Pillage { unit } => format!("p u_{unit}"),
            Self::Raw(text) => text.clone(),
        }
    }
}

/// Structured input for turn fuzzing.
#[derive(Arbitrary, Debug)]
struct TurnInput {
    /// Map seed.
    seed: u64,
    /// Commands per turn, tagged with the issuing team.
    turns: Vec<Vec<(bool, FuzzCommand)>>,
    /// Start this many turns before the first night.
    night_offset: u8,
}

fuzz_target!(|input: TurnInput| {
    let config = GameConfig {
        width: 16,
        height: 16,
        seed: input.seed,
        ..GameConfig::default()
    };
    let Ok(mut state) = generate_map(config) else {
        return;
    };
    state.turn = 30u32.saturating_sub(u32::from(input.night_offset % 31));

    for turn in input.turns.iter().take(40) {
        let commands: Vec<Command> = turn
            .iter()
            .take(32)
            .map(|(b, cmd)| Command::new(if *b { Team::B } else { Team::A }, cmd.text()))
            .collect();
        resolve_turn(&mut state, &commands);

        let violations = check_invariants(&state);
        assert!(
            violations.is_empty(),
            "Invariants violated after turn {}: {:?}",
            state.turn,
            violations
        );
        if state.is_game_over() {
            break;
        }
    }
});
