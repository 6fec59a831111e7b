//! Entity registry: teams, units, cities and city tiles.
//!
//! The registry owns every entity by id (units, cities) or by position
//! (city tiles). The grid only records which unit ids stand on each cell, so
//! there is never more than one owner for any piece of state.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::game::{City, CityTile, Position, Unit};

/// One of the two competing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Team {
    /// Team 0.
    A,
    /// Team 1.
    B,
}

impl Team {
    /// Both teams in execution order.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// Array index of this team.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    /// The other team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> Self {
        match team {
            Team::A => 0,
            Team::B => 1,
        }
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::A),
            1 => Ok(Self::B),
            other => Err(format!("unknown team {other}")),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

macro_rules! entity_id {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.strip_prefix($prefix)
                    .and_then(|n| n.parse().ok())
                    .map(Self)
                    .ok_or_else(|| format!(concat!("expected `", $prefix, "<n>`, got `{}`"), s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

entity_id!(UnitId, "u_", "Unit identifier, rendered `u_<n>`.");
entity_id!(CityId, "c_", "City identifier, rendered `c_<n>`.");

/// Issues monotonically increasing entity ids.
///
/// Counters hold the last number issued. Ids are never reused, even after
/// the entity is destroyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdAllocator {
    /// Last unit number issued.
    pub last_unit: u32,
    /// Last city number issued.
    pub last_city: u32,
}

impl IdAllocator {
    /// Issue the next unit id.
    pub const fn next_unit(&mut self) -> UnitId {
        self.last_unit += 1;
        UnitId(self.last_unit)
    }

    /// Issue the next city id.
    pub const fn next_city(&mut self) -> CityId {
        self.last_city += 1;
        CityId(self.last_city)
    }
}

/// Research unlocks of a team. Once set, a flag stays set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Researched {
    /// Coal collection unlocked.
    pub coal: bool,
    /// Uranium collection unlocked.
    pub uranium: bool,
}

/// Per-team state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamState {
    /// Accumulated research points.
    pub research_points: u32,
    /// Research unlocks.
    pub researched: Researched,
    /// Units owned by the team, by id.
    pub units: BTreeMap<UnitId, Unit>,
}

/// Owner of every unit, city and city tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    /// Team states indexed by [`Team::index`].
    pub teams: [TeamState; 2],
    /// Cities by id.
    pub cities: BTreeMap<CityId, City>,
    /// City tiles by position.
    pub city_tiles: BTreeMap<Position, CityTile>,
    /// Id counters.
    pub ids: IdAllocator,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one team.
    #[must_use]
    pub const fn team(&self, team: Team) -> &TeamState {
        &self.teams[team.index()]
    }

    /// Mutable state of one team.
    pub const fn team_mut(&mut self, team: Team) -> &mut TeamState {
        &mut self.teams[team.index()]
    }

    /// Look up a unit of either team.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.teams.iter().find_map(|t| t.units.get(&id))
    }

    /// Look up a unit of either team mutably.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.teams.iter_mut().find_map(|t| t.units.get_mut(&id))
    }

    /// Iterate over all units, team A first, each team by ascending id.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.teams.iter().flat_map(|t| t.units.values())
    }

    /// Ids of all units in execution order.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units().map(|u| u.id).collect()
    }

    /// Add a unit to its team. The caller places it on the grid.
    pub fn insert_unit(&mut self, unit: Unit) {
        self.team_mut(unit.team).units.insert(unit.id, unit);
    }

    /// Remove a unit. The caller clears it from the grid.
    pub fn remove_unit(&mut self, id: UnitId) -> Option<Unit> {
        self.teams.iter_mut().find_map(|t| t.units.remove(&id))
    }

    /// The city tile at a position, if any.
    #[must_use]
    pub fn city_tile(&self, pos: Position) -> Option<&CityTile> {
        self.city_tiles.get(&pos)
    }

    /// Whether a position holds a city tile of any team.
    #[must_use]
    pub fn is_city_tile(&self, pos: Position) -> bool {
        self.city_tiles.contains_key(&pos)
    }

    /// Number of city tiles owned by a team.
    #[must_use]
    pub fn city_tile_count(&self, team: Team) -> usize {
        self.city_tiles.values().filter(|t| t.team == team).count()
    }

    /// Sum of the adjacency counters of a city's tiles.
    #[must_use]
    pub fn adjacency_sum(&self, city: &City) -> u32 {
        city.cells
            .iter()
            .filter_map(|pos| self.city_tiles.get(pos))
            .map(|t| t.adjacent)
            .sum()
    }

    fn neighbors(pos: Position) -> impl Iterator<Item = Position> {
        let x = i32::from(pos.x);
        let y = i32::from(pos.y);
        [(x, y - 1), (x + 1, y), (x, y + 1), (x - 1, y)]
            .into_iter()
            .filter_map(|(nx, ny)| Some(Position::new(u16::try_from(nx).ok()?, u16::try_from(ny).ok()?)))
    }

    fn same_team_neighbors(&self, pos: Position, team: Team) -> Vec<Position> {
        Self::neighbors(pos)
            .filter(|n| self.city_tiles.get(n).is_some_and(|t| t.team == team))
            .collect()
    }

    /// Found a city tile, merging every same-team city it touches.
    ///
    /// The surviving city is the touched city with the lowest id; the fuel of
    /// the absorbed cities is added to it. Returns the id of the city that
    /// now contains the tile.
    pub fn add_city_tile(&mut self, team: Team, pos: Position) -> CityId {
        let neighbors = self.same_team_neighbors(pos, team);
        let touched: BTreeSet<CityId> = neighbors
            .iter()
            .filter_map(|n| self.city_tiles.get(n).map(|t| t.city_id))
            .collect();

        let city_id = if let Some(&survivor) = touched.first() {
            for &absorbed in touched.iter().skip(1) {
                let Some(city) = self.cities.remove(&absorbed) else {
                    continue;
                };
                for cell in &city.cells {
                    if let Some(tile) = self.city_tiles.get_mut(cell) {
                        tile.city_id = survivor;
                    }
                }
                if let Some(target) = self.cities.get_mut(&survivor) {
                    target.fuel += city.fuel;
                    target.cells.extend(city.cells);
                }
            }
            if let Some(target) = self.cities.get_mut(&survivor) {
                target.cells.push(pos);
            }
            survivor
        } else {
            let id = self.ids.next_city();
            self.cities.insert(id, City::new(id, team, pos));
            id
        };

        let mut tile = CityTile::new(pos, city_id, team);
        tile.adjacent = u32::try_from(neighbors.len()).unwrap_or(u32::MAX);
        for n in &neighbors {
            if let Some(t) = self.city_tiles.get_mut(n) {
                t.adjacent += 1;
            }
        }
        self.city_tiles.insert(pos, tile);
        city_id
    }

    fn detach_tile(&mut self, pos: Position) -> Option<CityTile> {
        let tile = self.city_tiles.remove(&pos)?;
        for n in Self::neighbors(pos) {
            match self.city_tiles.get_mut(&n) {
                Some(t) if t.team == tile.team => t.adjacent = t.adjacent.saturating_sub(1),
                _ => {}
            }
        }
        Some(tile)
    }

    /// Remove a single city tile, splitting its city if it falls apart.
    ///
    /// When the remaining tiles form more than one connected group, the old
    /// city id is retired and each group becomes a city with a fresh id. Fuel
    /// is shared out in proportion to tile counts; the last group receives
    /// the rounding remainder. Returns the ids of the cities that now hold
    /// the remaining tiles.
    pub fn remove_city_tile(&mut self, pos: Position) -> Vec<CityId> {
        let Some(tile) = self.detach_tile(pos) else {
            return Vec::new();
        };
        let Some(mut city) = self.cities.remove(&tile.city_id) else {
            return Vec::new();
        };
        city.cells.retain(|&p| p != pos);
        if city.cells.is_empty() {
            return Vec::new();
        }

        let components = self.components(&city.cells);
        if components.len() == 1 {
            let id = city.id;
            self.cities.insert(id, city);
            return vec![id];
        }

        #[allow(clippy::cast_precision_loss)]
        let total = city.cells.len() as f64;
        let mut remaining_fuel = city.fuel;
        let last = components.len() - 1;
        let mut ids = Vec::with_capacity(components.len());
        for (i, cells) in components.into_iter().enumerate() {
            let id = self.ids.next_city();
            #[allow(clippy::cast_precision_loss)]
            let fuel = if i == last {
                remaining_fuel
            } else {
                (city.fuel * cells.len() as f64 / total).floor()
            };
            remaining_fuel -= fuel;
            for cell in &cells {
                if let Some(t) = self.city_tiles.get_mut(cell) {
                    t.city_id = id;
                }
            }
            self.cities.insert(
                id,
                City {
                    id,
                    team: city.team,
                    fuel,
                    cells,
                },
            );
            ids.push(id);
        }
        ids
    }

    /// Connected groups of `cells`, each in the order the cells appear.
    fn components(&self, cells: &[Position]) -> Vec<Vec<Position>> {
        let members: BTreeSet<Position> = cells.iter().copied().collect();
        let mut seen = BTreeSet::new();
        let mut groups = Vec::new();
        for &start in cells {
            if !seen.insert(start) {
                continue;
            }
            let mut group = BTreeSet::from([start]);
            let mut queue = VecDeque::from([start]);
            while let Some(p) = queue.pop_front() {
                for n in Self::neighbors(p) {
                    if members.contains(&n) && self.city_tiles.contains_key(&n) && seen.insert(n) {
                        group.insert(n);
                        queue.push_back(n);
                    }
                }
            }
            groups.push(cells.iter().copied().filter(|c| group.contains(c)).collect());
        }
        groups
    }

    /// Remove a city and all of its tiles.
    ///
    /// Returns the removed city so the caller can reset the grid under it.
    pub fn destroy_city(&mut self, id: CityId) -> Option<City> {
        let city = self.cities.remove(&id)?;
        for &pos in &city.cells {
            self.detach_tile(pos);
        }
        Some(city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: u16, y: u16) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_id_display_and_parse() {
        assert_eq!(UnitId(7).to_string(), "u_7");
        assert_eq!("c_12".parse::<CityId>().unwrap(), CityId(12));
        assert!("u_x".parse::<UnitId>().is_err());
        assert!("c_3".parse::<UnitId>().is_err());
    }

    #[test]
    fn test_ids_never_reused() {
        let mut registry = Registry::new();
        let a = registry.add_city_tile(Team::A, p(0, 0));
        registry.destroy_city(a);
        let b = registry.add_city_tile(Team::A, p(0, 0));
        assert_eq!(a, CityId(1));
        assert_eq!(b, CityId(2));
        assert_eq!(registry.ids.last_city, 2);
    }

    #[test]
    fn test_adjacent_tile_joins_city() {
        let mut registry = Registry::new();
        let a = registry.add_city_tile(Team::A, p(1, 1));
        let b = registry.add_city_tile(Team::A, p(2, 1));
        assert_eq!(a, b);
        assert_eq!(registry.cities[&a].cells, vec![p(1, 1), p(2, 1)]);
        assert_eq!(registry.city_tiles[&p(1, 1)].adjacent, 1);
        assert_eq!(registry.city_tiles[&p(2, 1)].adjacent, 1);
    }

    #[test]
    fn test_opponent_tiles_do_not_merge() {
        let mut registry = Registry::new();
        let a = registry.add_city_tile(Team::A, p(1, 1));
        let b = registry.add_city_tile(Team::B, p(2, 1));
        assert_ne!(a, b);
        assert_eq!(registry.city_tiles[&p(1, 1)].adjacent, 0);
    }

    #[test]
    fn test_merge_keeps_lowest_id_and_sums_fuel() {
        let mut registry = Registry::new();
        let left = registry.add_city_tile(Team::A, p(0, 1));
        let right = registry.add_city_tile(Team::A, p(2, 1));
        registry.cities.get_mut(&left).unwrap().fuel = 30.0;
        registry.cities.get_mut(&right).unwrap().fuel = 12.0;

        let merged = registry.add_city_tile(Team::A, p(1, 1));
        assert_eq!(merged, left);
        assert_eq!(registry.cities.len(), 1);
        let city = &registry.cities[&left];
        assert!((city.fuel - 42.0).abs() < f64::EPSILON);
        assert_eq!(city.cells.len(), 3);
        assert_eq!(registry.city_tiles[&p(2, 1)].city_id, left);
        assert_eq!(registry.city_tiles[&p(1, 1)].adjacent, 2);
    }

    #[test]
    fn test_split_assigns_fresh_ids_and_conserves_fuel() {
        let mut registry = Registry::new();
        for x in 0..4 {
            registry.add_city_tile(Team::A, p(x, 0));
        }
        let id = registry.city_tiles[&p(0, 0)].city_id;
        registry.cities.get_mut(&id).unwrap().fuel = 100.0;

        // leaves {0} and {2, 3}
        let parts = registry.remove_city_tile(p(1, 0));
        assert_eq!(parts, vec![CityId(2), CityId(3)]);
        assert!(!registry.cities.contains_key(&id));
        let first = &registry.cities[&CityId(2)];
        let second = &registry.cities[&CityId(3)];
        assert_eq!(first.cells, vec![p(0, 0)]);
        assert_eq!(second.cells, vec![p(2, 0), p(3, 0)]);
        assert!((first.fuel - 33.0).abs() < f64::EPSILON);
        assert!((first.fuel + second.fuel - 100.0).abs() < f64::EPSILON);
        assert_eq!(registry.city_tiles[&p(0, 0)].adjacent, 0);
        assert_eq!(registry.city_tiles[&p(2, 0)].adjacent, 1);
    }

    #[test]
    fn test_remove_edge_tile_keeps_city() {
        let mut registry = Registry::new();
        registry.add_city_tile(Team::B, p(0, 0));
        registry.add_city_tile(Team::B, p(0, 1));
        let parts = registry.remove_city_tile(p(0, 1));
        assert_eq!(parts, vec![CityId(1)]);
        assert_eq!(registry.city_tile_count(Team::B), 1);
    }

    #[test]
    fn test_destroy_city_removes_tiles() {
        let mut registry = Registry::new();
        let id = registry.add_city_tile(Team::A, p(3, 3));
        registry.add_city_tile(Team::A, p(3, 4));
        let city = registry.destroy_city(id).unwrap();
        assert_eq!(city.cells.len(), 2);
        assert!(registry.city_tiles.is_empty());
        assert!(registry.destroy_city(id).is_none());
    }

    #[test]
    fn test_team_serde_as_number() {
        assert_eq!(serde_json::to_string(&Team::B).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Team>("0").unwrap(), Team::A);
        assert!(serde_json::from_str::<Team>("3").is_err());
    }
}
