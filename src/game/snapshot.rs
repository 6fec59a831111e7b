//! Serializable snapshots of the full game state.
//!
//! The JSON layout is
//!
//! ```text
//! { map: [[{road, resource?}]], cities: {id: {id, team, cityCells, fuel}},
//!   teamStates: {team: {researchPoints, researched, units}}, turn,
//!   globalCityIDCount, globalUnitIDCount }
//! ```
//!
//! All maps are ordered, so serializing the same state always yields the
//! same bytes. [`Snapshot::restore`] checks the whole snapshot before it
//! hands out a state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::error::SnapshotError;
use crate::game::{
    Cargo, City, CityId, CityTile, GameMap, GameState, Position, Registry, Researched,
    ResourceType, Team, TeamState, Unit, UnitId, UnitType, check_invariants,
};

/// A resource deposit as stored in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Resource kind.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Remaining amount.
    pub amount: i64,
}

/// One map cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    /// Road level.
    pub road: f64,
    /// Resource deposit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceSnapshot>,
}

/// One city tile of a city.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CityCellSnapshot {
    /// X coordinate.
    pub x: i64,
    /// Y coordinate.
    pub y: i64,
    /// Tile cooldown.
    pub cooldown: f64,
}

/// A city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitySnapshot {
    /// City id.
    pub id: CityId,
    /// Owning team.
    pub team: Team,
    /// Member tiles in join order.
    pub city_cells: Vec<CityCellSnapshot>,
    /// Stored fuel.
    pub fuel: f64,
}

/// Carried resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoSnapshot {
    /// Wood carried.
    pub wood: i64,
    /// Coal carried.
    pub coal: i64,
    /// Uranium carried.
    pub uranium: i64,
}

/// A unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Worker (0) or cart (1).
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    /// X coordinate.
    pub x: i64,
    /// Y coordinate.
    pub y: i64,
    /// Unit cooldown.
    pub cooldown: f64,
    /// Carried resources.
    pub cargo: CargoSnapshot,
}

/// Per-team state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    /// Accumulated research points.
    pub research_points: i64,
    /// Research unlocks.
    pub researched: Researched,
    /// Units by id.
    pub units: BTreeMap<UnitId, UnitSnapshot>,
}

/// Full game state as plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Cells indexed as `map[y][x]`.
    pub map: Vec<Vec<CellSnapshot>>,
    /// Cities by id.
    pub cities: BTreeMap<CityId, CitySnapshot>,
    /// Team states by team.
    pub team_states: BTreeMap<Team, TeamSnapshot>,
    /// Turn counter.
    pub turn: u32,
    /// Last city number issued.
    #[serde(rename = "globalCityIDCount")]
    pub global_city_id_count: u32,
    /// Last unit number issued.
    #[serde(rename = "globalUnitIDCount")]
    pub global_unit_id_count: u32,
}

fn to_position(what: impl Fn() -> String, x: i64, y: i64, width: usize, height: usize) -> Result<Position, SnapshotError> {
    let in_range = |v: i64, limit: usize| usize::try_from(v).is_ok_and(|v| v < limit);
    if !in_range(x, width) || !in_range(y, height) {
        return Err(SnapshotError::OutOfBounds { what: what(), x, y });
    }
    match (u16::try_from(x), u16::try_from(y)) {
        (Ok(x), Ok(y)) => Ok(Position::new(x, y)),
        _ => Err(SnapshotError::OutOfBounds { what: what(), x, y }),
    }
}

fn non_negative(what: &str, value: f64) -> Result<f64, SnapshotError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SnapshotError::Invariant(format!("{what} must be a non-negative number, got {value}")))
    }
}

fn amount(what: &str, value: i64) -> Result<u32, SnapshotError> {
    u32::try_from(value)
        .map_err(|_| SnapshotError::Invariant(format!("{what} must be a non-negative integer, got {value}")))
}

fn checked_cargo(id: UnitId, cargo: CargoSnapshot) -> Result<Cargo, SnapshotError> {
    Ok(Cargo {
        wood: amount(&format!("{id} wood"), cargo.wood)?,
        coal: amount(&format!("{id} coal"), cargo.coal)?,
        uranium: amount(&format!("{id} uranium"), cargo.uranium)?,
    })
}

impl Snapshot {
    /// Capture the current state.
    #[must_use]
    pub fn capture(state: &GameState) -> Self {
        let map = (0..state.map.height())
            .map(|y| {
                (0..state.map.width())
                    .filter_map(|x| state.map.get(Position::new(x, y)))
                    .map(|cell| CellSnapshot {
                        road: cell.road,
                        resource: cell.resource.map(|r| ResourceSnapshot {
                            resource_type: r.resource_type,
                            amount: i64::from(r.amount),
                        }),
                    })
                    .collect()
            })
            .collect();

        let registry = &state.registry;
        let cities = registry
            .cities
            .values()
            .map(|city| {
                let city_cells = city
                    .cells
                    .iter()
                    .map(|&pos| CityCellSnapshot {
                        x: i64::from(pos.x),
                        y: i64::from(pos.y),
                        cooldown: registry.city_tile(pos).map_or(0.0, |t| t.cooldown),
                    })
                    .collect();
                (
                    city.id,
                    CitySnapshot {
                        id: city.id,
                        team: city.team,
                        city_cells,
                        fuel: city.fuel,
                    },
                )
            })
            .collect();

        let team_states = Team::ALL
            .iter()
            .map(|&team| {
                let ts = registry.team(team);
                let units = ts
                    .units
                    .values()
                    .map(|u| {
                        (
                            u.id,
                            UnitSnapshot {
                                unit_type: u.unit_type,
                                x: i64::from(u.pos.x),
                                y: i64::from(u.pos.y),
                                cooldown: u.cooldown,
                                cargo: CargoSnapshot {
                                    wood: i64::from(u.cargo.wood),
                                    coal: i64::from(u.cargo.coal),
                                    uranium: i64::from(u.cargo.uranium),
                                },
                            },
                        )
                    })
                    .collect();
                (
                    team,
                    TeamSnapshot {
                        research_points: i64::from(ts.research_points),
                        researched: ts.researched,
                        units,
                    },
                )
            })
            .collect();

        Self {
            map,
            cities,
            team_states,
            turn: state.turn,
            global_city_id_count: registry.ids.last_city,
            global_unit_id_count: registry.ids.last_unit,
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON without validating the contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not have the snapshot shape.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rebuild a game state from this snapshot.
    ///
    /// The map size of `config` is replaced by the snapshot's and the
    /// result must validate. Field values are checked first (dimensions,
    /// bounds, non-negative values, cargo against capacity, duplicate tiles
    /// and ids, id counters); the assembled state must then pass
    /// [`check_invariants`], which covers who may share a cell and whether
    /// every city is one connected group of tiles.
    ///
    /// [`check_invariants`]: crate::game::check_invariants
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn restore(&self, mut config: GameConfig) -> Result<GameState, SnapshotError> {
        let params = config.parameters;

        // dimensions
        let height = self.map.len();
        let width = self.map.first().map_or(0, Vec::len);
        let (Ok(w16), Ok(h16)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(SnapshotError::BadDimensions { width, height });
        };
        if width == 0 || height == 0 {
            return Err(SnapshotError::BadDimensions { width, height });
        }
        config.width = w16;
        config.height = h16;
        config.validate()?;
        for (row, cells) in self.map.iter().enumerate() {
            if cells.len() != width {
                return Err(SnapshotError::RaggedRow {
                    row,
                    len: cells.len(),
                    expected: width,
                });
            }
        }

        // cells
        let mut resources = Vec::new();
        for (y, row) in (0u16..).zip(&self.map) {
            for (x, cell) in (0u16..).zip(row) {
                let road = non_negative("road level", cell.road)?;
                if road < params.min_road || road > params.max_road {
                    return Err(SnapshotError::Invariant(format!(
                        "road level {road} at ({x}, {y}) is outside [{}, {}]",
                        params.min_road, params.max_road
                    )));
                }
                if let Some(r) = cell.resource {
                    let n = amount("resource amount", r.amount)?;
                    resources.push((Position::new(x, y), r.resource_type, n));
                }
            }
        }

        // cities
        let mut tiles: BTreeMap<Position, (CityId, Team, f64)> = BTreeMap::new();
        let mut cities = BTreeMap::new();
        for (&key, city) in &self.cities {
            if key != city.id {
                return Err(SnapshotError::Invariant(format!(
                    "city stored under {key} has id {}",
                    city.id
                )));
            }
            if city.id.0 == 0 || city.id.0 > self.global_city_id_count {
                return Err(SnapshotError::Invariant(format!(
                    "{} exceeds the city id counter {}",
                    city.id, self.global_city_id_count
                )));
            }
            if city.city_cells.is_empty() {
                return Err(SnapshotError::Invariant(format!("{} has no tiles", city.id)));
            }
            let fuel = non_negative("city fuel", city.fuel)?;
            let mut cells = Vec::with_capacity(city.city_cells.len());
            for cc in &city.city_cells {
                let pos = to_position(|| format!("tile of {}", city.id), cc.x, cc.y, width, height)?;
                let cooldown = non_negative("city tile cooldown", cc.cooldown)?;
                if tiles.insert(pos, (city.id, city.team, cooldown)).is_some() {
                    return Err(SnapshotError::Invariant(format!(
                        "city tile at {pos} appears twice"
                    )));
                }
                cells.push(pos);
            }
            cities.insert(
                city.id,
                City {
                    id: city.id,
                    team: city.team,
                    fuel,
                    cells,
                },
            );
        }

        // teams and units
        let mut seen_units = BTreeSet::new();
        let mut teams: [TeamState; 2] = Default::default();
        for (&team, ts) in &self.team_states {
            let state = &mut teams[team.index()];
            state.research_points = amount("research points", ts.research_points)?;
            state.researched = ts.researched;
            for (&id, u) in &ts.units {
                if !seen_units.insert(id) {
                    return Err(SnapshotError::Invariant(format!("{id} appears twice")));
                }
                if id.0 == 0 || id.0 > self.global_unit_id_count {
                    return Err(SnapshotError::Invariant(format!(
                        "{id} exceeds the unit id counter {}",
                        self.global_unit_id_count
                    )));
                }
                let pos = to_position(|| id.to_string(), u.x, u.y, width, height)?;
                let cargo = checked_cargo(id, u.cargo)?;
                let capacity = params.resource_capacity.get(u.unit_type);
                let carried =
                    u64::from(cargo.wood) + u64::from(cargo.coal) + u64::from(cargo.uranium);
                if carried > u64::from(capacity) {
                    return Err(SnapshotError::Invariant(format!(
                        "{id} carries {carried} but holds at most {capacity}"
                    )));
                }
                let mut unit = Unit::new(id, team, u.unit_type, pos);
                unit.cargo = cargo;
                unit.cooldown = non_negative("unit cooldown", u.cooldown)?;
                state.units.insert(id, unit);
            }
        }

        // build: grid, then cities, then units, then globals
        let mut map = GameMap::new(w16, h16).ok_or(SnapshotError::BadDimensions { width, height })?;
        for (y, row) in (0u16..).zip(&self.map) {
            for (x, cell) in (0u16..).zip(row) {
                if let Some(c) = map.get_mut(Position::new(x, y)) {
                    c.road = cell.road;
                }
            }
        }
        for (pos, resource_type, n) in resources {
            map.add_resource(pos, resource_type, n);
        }

        let mut registry = Registry::new();
        for (&pos, &(city_id, team, cooldown)) in &tiles {
            let mut tile = CityTile::new(pos, city_id, team);
            tile.cooldown = cooldown;
            let (adjacent, count) = map.adjacent(pos);
            let same_team = adjacent[..count]
                .iter()
                .filter(|n| tiles.get(n).is_some_and(|&(_, t, _)| t == team))
                .count();
            tile.adjacent = u32::try_from(same_team).unwrap_or(0);
            registry.city_tiles.insert(pos, tile);
        }
        registry.cities = cities;

        for team in &teams {
            for unit in team.units.values() {
                if let Some(cell) = map.get_mut(unit.pos) {
                    cell.units.insert(unit.id);
                }
            }
        }
        registry.teams = teams;
        registry.ids.last_city = self.global_city_id_count;
        registry.ids.last_unit = self.global_unit_id_count;

        let state = GameState::from_parts(map, registry, self.turn, config);
        let violations = check_invariants(&state);
        if !violations.is_empty() {
            let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
            return Err(SnapshotError::Invariant(messages.join("; ")));
        }
        Ok(state)
    }
}
