//! Game layer.
//!
//! Implements the rules of the day/night resource game:
//! - Map with resource cells and road levels
//! - Registry of units, cities and city tiles
//! - Command validation and simultaneous movement
//! - Fair resource distribution
//! - Turn resolution and state snapshots

mod actions;
mod city;
mod distribution;
mod invariants;
mod map;
mod movement;
mod registry;
mod snapshot;
mod state;
mod turn;
mod unit;
mod validate;

pub use actions::{Action, Actionable, Actor, MoveAction};
pub use city::{City, CityTile};
pub use distribution::{Grant, distribute_all_resources, water_fill};
pub use invariants::{InvariantViolation, assert_invariants, check_invariants};
pub use map::{Cell, Direction, GameMap, Position, Resource, ResourceType};
pub use movement::resolve_movement;
pub use registry::{CityId, IdAllocator, Registry, Researched, Team, TeamState, UnitId};
pub use snapshot::{
    CargoSnapshot, CellSnapshot, CityCellSnapshot, CitySnapshot, ResourceSnapshot, Snapshot,
    TeamSnapshot, UnitSnapshot,
};
pub use state::{GameState, MatchStatus};
pub use turn::{
    ActorError, PhaseTiming, RejectedCommand, TurnOutcome, TurnPhase, TurnReport, resolve_turn,
};
pub use unit::{Cargo, Unit, UnitType};
pub use validate::{AccumulatedActionStats, validate_command};
