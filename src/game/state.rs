//! Game state management.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{GameConfig, Parameters};
use crate::error::{ConfigError, ExecutionError};
use crate::game::{City, CityId, GameMap, Position, Registry, Team, Unit, UnitId, UnitType};

/// Complete game state.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    /// The game map.
    pub map: GameMap,
    /// Units, cities and team state.
    pub registry: Registry,
    /// Current turn number (0-indexed).
    pub turn: u32,
    /// Match configuration.
    pub config: GameConfig,
    /// Random stream seeded from the config; only map generation draws from it.
    rng: ChaCha8Rng,
}

/// Whether a match is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// More turns will be played.
    Running,
    /// The match is over.
    Finished {
        /// Winning team, or `None` for a tie.
        winner: Option<Team>,
    },
}

impl GameState {
    /// Create a state with an empty map of the configured size.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let map = GameMap::new(config.width, config.height)
            .ok_or_else(|| ConfigError::Invalid("map must be non-empty".into()))?;
        Ok(Self::from_parts(map, Registry::new(), 0, config))
    }

    /// Assemble a state from already validated parts.
    #[must_use]
    pub fn from_parts(map: GameMap, registry: Registry, turn: u32, config: GameConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            map,
            registry,
            turn,
            config,
            rng,
        }
    }

    /// Game rule constants.
    #[must_use]
    pub const fn params(&self) -> &Parameters {
        &self.config.parameters
    }

    /// The seeded random stream.
    pub const fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Whether the current turn is a night turn.
    #[must_use]
    pub const fn is_night(&self) -> bool {
        self.config.is_night(self.turn)
    }

    /// Spawn a fresh unit on a cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is outside the map.
    pub fn spawn_unit(
        &mut self,
        team: Team,
        unit_type: UnitType,
        pos: Position,
    ) -> Result<UnitId, ExecutionError> {
        if !self.map.in_bounds(pos) {
            return Err(ExecutionError::Precondition(format!(
                "cannot spawn a unit outside the map at {pos}"
            )));
        }
        let id = self.registry.ids.next_unit();
        self.place_unit(Unit::new(id, team, unit_type, pos))?;
        Ok(id)
    }

    /// Put an existing unit record on the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit's position is outside the map.
    pub fn place_unit(&mut self, unit: Unit) -> Result<(), ExecutionError> {
        let cell = self.map.get_mut(unit.pos).ok_or_else(|| {
            ExecutionError::Precondition(format!("{} is outside the map at {}", unit.id, unit.pos))
        })?;
        cell.units.insert(unit.id);
        self.registry.insert_unit(unit);
        Ok(())
    }

    /// Move a unit to another cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is gone or the target is off the map.
    pub fn move_unit(&mut self, id: UnitId, target: Position) -> Result<(), ExecutionError> {
        if !self.map.in_bounds(target) {
            return Err(ExecutionError::Precondition(format!(
                "{id} cannot move off the map to {target}"
            )));
        }
        let unit = self
            .registry
            .unit_mut(id)
            .ok_or(ExecutionError::MissingUnit(id))?;
        let from = unit.pos;
        unit.pos = target;
        if let Some(cell) = self.map.get_mut(from) {
            cell.units.remove(&id);
        }
        if let Some(cell) = self.map.get_mut(target) {
            cell.units.insert(id);
        }
        Ok(())
    }

    /// Remove a unit from the registry and the map.
    pub fn destroy_unit(&mut self, id: UnitId) -> Option<Unit> {
        let unit = self.registry.remove_unit(id)?;
        if let Some(cell) = self.map.get_mut(unit.pos) {
            cell.units.remove(&id);
        }
        Some(unit)
    }

    /// Found a city tile and raise its road to the maximum.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is off the map or already a city tile.
    pub fn spawn_city_tile(&mut self, team: Team, pos: Position) -> Result<CityId, ExecutionError> {
        if self.registry.is_city_tile(pos) {
            return Err(ExecutionError::Precondition(format!(
                "{pos} is already a city tile"
            )));
        }
        let max_road = self.params().max_road;
        let cell = self.map.get_mut(pos).ok_or_else(|| {
            ExecutionError::Precondition(format!("cannot found a city outside the map at {pos}"))
        })?;
        cell.road = max_road;
        Ok(self.registry.add_city_tile(team, pos))
    }

    /// Destroy a whole city and reset the roads under it.
    pub fn destroy_city(&mut self, id: CityId) -> Option<City> {
        let city = self.registry.destroy_city(id)?;
        let min_road = self.params().min_road;
        for &pos in &city.cells {
            if let Some(cell) = self.map.get_mut(pos) {
                cell.road = min_road;
            }
        }
        Some(city)
    }

    /// Number of units a team owns.
    #[must_use]
    pub fn unit_count(&self, team: Team) -> usize {
        self.registry.team(team).units.len()
    }

    /// Number of city tiles a team owns.
    #[must_use]
    pub fn city_tile_count(&self, team: Team) -> usize {
        self.registry.city_tile_count(team)
    }

    /// Check if the match is over.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        if self.turn >= self.params().max_days {
            return true;
        }
        Team::ALL
            .iter()
            .any(|&t| self.unit_count(t) == 0 && self.city_tile_count(t) == 0)
    }

    /// Team ahead on city tiles, then on units; `None` for a tie.
    #[must_use]
    pub fn leader(&self) -> Option<Team> {
        let score = |t| (self.city_tile_count(t), self.unit_count(t));
        match score(Team::A).cmp(&score(Team::B)) {
            std::cmp::Ordering::Greater => Some(Team::A),
            std::cmp::Ordering::Less => Some(Team::B),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Current match status.
    #[must_use]
    pub fn status(&self) -> MatchStatus {
        if self.is_game_over() {
            MatchStatus::Finished {
                winner: self.leader(),
            }
        } else {
            MatchStatus::Running
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_state() -> GameState {
        let config = GameConfig {
            width: 8,
            height: 8,
            ..GameConfig::default()
        };
        GameState::new(config).unwrap()
    }

    #[test]
    fn test_spawn_and_move_unit() {
        let mut state = create_test_state();
        let id = state
            .spawn_unit(Team::A, UnitType::Worker, Position::new(1, 1))
            .unwrap();
        assert_eq!(id, UnitId(1));
        state.move_unit(id, Position::new(2, 1)).unwrap();
        assert!(state.map.get(Position::new(1, 1)).unwrap().units.is_empty());
        assert!(state.map.get(Position::new(2, 1)).unwrap().units.contains(&id));
        assert_eq!(state.registry.unit(id).unwrap().pos, Position::new(2, 1));
    }

    #[test]
    fn test_spawn_outside_map_fails() {
        let mut state = create_test_state();
        assert!(
            state
                .spawn_unit(Team::A, UnitType::Cart, Position::new(8, 0))
                .is_err()
        );
        assert_eq!(state.registry.ids.last_unit, 0);
    }

    #[test]
    fn test_city_roads() {
        let mut state = create_test_state();
        let pos = Position::new(3, 3);
        let id = state.spawn_city_tile(Team::B, pos).unwrap();
        assert!((state.map.get(pos).unwrap().road - 6.0).abs() < f64::EPSILON);
        assert!(state.spawn_city_tile(Team::A, pos).is_err());
        state.destroy_city(id).unwrap();
        assert!(state.map.get(pos).unwrap().road.abs() < f64::EPSILON);
    }

    #[test]
    fn test_game_over_when_team_eliminated() {
        let mut state = create_test_state();
        state.spawn_city_tile(Team::A, Position::new(0, 0)).unwrap();
        assert!(state.is_game_over());
        assert_eq!(
            state.status(),
            MatchStatus::Finished {
                winner: Some(Team::A)
            }
        );

        state
            .spawn_unit(Team::B, UnitType::Worker, Position::new(5, 5))
            .unwrap();
        assert_eq!(state.status(), MatchStatus::Running);
    }

    #[test]
    fn test_game_over_at_max_days() {
        let mut state = create_test_state();
        state.spawn_city_tile(Team::A, Position::new(0, 0)).unwrap();
        state.spawn_city_tile(Team::B, Position::new(7, 7)).unwrap();
        assert!(!state.is_game_over());
        state.turn = state.params().max_days;
        assert_eq!(state.status(), MatchStatus::Finished { winner: None });
    }
}
