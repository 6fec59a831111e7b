//! Cities and the tiles they are made of.

use crate::config::Parameters;
use crate::error::ExecutionError;
use crate::game::{Action, Actionable, CityId, Position, Team};

/// A connected group of same-team city tiles sharing one fuel pool.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    /// Unique id.
    pub id: CityId,
    /// Owning team.
    pub team: Team,
    /// Fuel stored for the night.
    pub fuel: f64,
    /// Member tiles in the order they joined.
    pub cells: Vec<Position>,
}

impl City {
    /// Create a city with no fuel and a single tile.
    #[must_use]
    pub fn new(id: CityId, team: Team, pos: Position) -> Self {
        Self {
            id,
            team,
            fuel: 0.0,
            cells: vec![pos],
        }
    }

    /// Fuel the city burns on a night turn.
    ///
    /// `adjacency_sum` is the total of same-team neighbor counts over all of
    /// the city's tiles.
    #[must_use]
    pub fn light_upkeep(&self, params: &Parameters, adjacency_sum: u32) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let tiles = self.cells.len() as f64;
        tiles * params.light_upkeep.city - f64::from(adjacency_sum) * params.city_adjacency_bonus
    }
}

/// One tile of a city.
#[derive(Debug, Clone, PartialEq)]
pub struct CityTile {
    /// Position on the map.
    pub pos: Position,
    /// City this tile belongs to.
    pub city_id: CityId,
    /// Owning team.
    pub team: Team,
    /// Turns until the tile may act again.
    pub cooldown: f64,
    /// Number of same-team orthogonal neighbors.
    pub adjacent: u32,
    /// Action assigned for the current turn.
    pending: Option<Action>,
}

impl CityTile {
    /// Create a tile with no cooldown.
    #[must_use]
    pub const fn new(pos: Position, city_id: CityId, team: Team) -> Self {
        Self {
            pos,
            city_id,
            team,
            cooldown: 0.0,
            adjacent: 0,
            pending: None,
        }
    }
}

impl Actionable for CityTile {
    fn cooldown(&self) -> f64 {
        self.cooldown
    }

    fn give_action(&mut self, action: Action) -> Result<(), ExecutionError> {
        if self.pending.is_some() {
            return Err(ExecutionError::ActionAlreadyAssigned);
        }
        self.pending = Some(action);
        Ok(())
    }

    fn take_action(&mut self) -> Option<Action> {
        self.pending.take()
    }
}
