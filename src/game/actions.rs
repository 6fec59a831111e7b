//! Typed actions and the actor interface.

use std::fmt;

use crate::error::ExecutionError;
use crate::game::{Direction, Position, ResourceType, Team, UnitId};

/// A validated move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveAction {
    /// Moving unit.
    pub unit: UnitId,
    /// Team owning the unit.
    pub team: Team,
    /// Direction of travel.
    pub direction: Direction,
    /// Cell the unit ends on if the move survives collision resolution.
    pub target: Position,
}

/// A validated action, ready to be assigned to its actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Move a unit one cell.
    Move(MoveAction),
    /// Hand cargo from one unit to another.
    Transfer {
        /// Giving unit.
        src: UnitId,
        /// Receiving unit.
        dst: UnitId,
        /// Resource handed over.
        resource: ResourceType,
        /// Requested amount, clamped on execution.
        amount: u32,
    },
    /// Spawn a worker on a city tile.
    BuildWorker {
        /// City tile position.
        pos: Position,
    },
    /// Spawn a cart on a city tile.
    BuildCart {
        /// City tile position.
        pos: Position,
    },
    /// Generate one research point.
    Research {
        /// City tile position.
        pos: Position,
    },
    /// Found a city tile under a worker.
    BuildCity {
        /// Building worker.
        unit: UnitId,
    },
    /// Degrade the road under a worker.
    Pillage {
        /// Pillaging worker.
        unit: UnitId,
    },
    /// Annotation kept for replays; never executed.
    Debug(String),
}

impl Action {
    /// The actor that performs this action, if any.
    #[must_use]
    pub const fn actor(&self) -> Option<Actor> {
        match self {
            Self::Move(m) => Some(Actor::Unit(m.unit)),
            Self::Transfer { src, .. } => Some(Actor::Unit(*src)),
            Self::BuildCity { unit } | Self::Pillage { unit } => Some(Actor::Unit(*unit)),
            Self::BuildWorker { pos } | Self::BuildCart { pos } | Self::Research { pos } => {
                Some(Actor::CityTile(*pos))
            }
            Self::Debug(_) => None,
        }
    }
}

/// Something that can hold an action for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Actor {
    /// A unit, by id.
    Unit(UnitId),
    /// A city tile, by position.
    CityTile(Position),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(id) => write!(f, "unit {id}"),
            Self::CityTile(pos) => write!(f, "city tile {pos}"),
        }
    }
}

/// Shared interface of units and city tiles.
///
/// An actor holds at most one pending action per turn. The turn executor
/// takes the action back out and applies it.
pub trait Actionable {
    /// Current cooldown.
    fn cooldown(&self) -> f64;

    /// Whether the actor may act this turn.
    fn can_act(&self) -> bool {
        self.cooldown() < 1.0
    }

    /// Assign the action for this turn.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::ActionAlreadyAssigned`] if an action is
    /// already pending.
    fn give_action(&mut self, action: Action) -> Result<(), ExecutionError>;

    /// Remove and return the pending action.
    fn take_action(&mut self) -> Option<Action>;
}
