// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Duskfall: a deterministic day/night resource game engine for bot competitions.
//!
//! Two teams of workers and carts gather wood, coal and uranium and grow
//! cities that must be kept fuelled through the night. The engine is the
//! sole authority on what every command does:
//! - Bit-exact deterministic turns
//! - Fair, order-independent resource distribution
//! - Simultaneous movement with iterative collision cancellation
//! - JSON snapshots and replays that re-verify themselves
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Match Runner / Replay / CLI       │
//! ├─────────────────────────────────────┤
//! │   Turn Executor (resolve_turn)      │
//! ├─────────────────────────────────────┤
//! │ Validator │ Movement │ Distribution │
//! ├─────────────────────────────────────┤
//! │      Map + Entity Registry          │
//! └─────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod protocol;
pub mod replay;
pub mod tournament;

pub use config::{GameConfig, Parameters};
pub use error::{CommandError, ConfigError, ExecutionError, MatchError, ReplayError, SnapshotError};

// Re-export key game types at crate root for convenience
pub use game::{
    GameState, MatchStatus, Position, Snapshot, Team, TurnOutcome, TurnReport, UnitId,
    resolve_turn,
};
pub use protocol::Command;
