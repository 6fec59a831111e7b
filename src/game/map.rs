//! Spatial grid: cells, resources and road levels.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::UnitId;

/// A position on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate (column).
    pub x: u16,
    /// Y coordinate (row).
    pub y: u16,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position.
    #[must_use]
    pub const fn distance_to(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) as u32 + self.y.abs_diff(other.y) as u32
    }

    /// Whether `other` is this position or one of its four neighbors.
    #[must_use]
    pub const fn is_adjacent_or_same(self, other: Self) -> bool {
        self.distance_to(other) <= 1
    }

    /// Step one cell in a direction, staying inside a `width` x `height` map.
    #[must_use]
    pub fn translate(self, direction: Direction, width: u16, height: u16) -> Option<Self> {
        let (x, y) = (i32::from(self.x), i32::from(self.y));
        let (nx, ny) = match direction {
            Direction::North => (x, y - 1),
            Direction::East => (x + 1, y),
            Direction::South => (x, y + 1),
            Direction::West => (x - 1, y),
            Direction::Center => (x, y),
        };
        let nx = u16::try_from(nx).ok()?;
        let ny = u16::try_from(ny).ok()?;
        (nx < width && ny < height).then_some(Self::new(nx, ny))
    }

    /// Orthogonal neighbors inside the map, in north, east, south, west order.
    ///
    /// Returns a fixed-size array and count to avoid heap allocation.
    #[must_use]
    #[inline]
    pub fn adjacent(self, width: u16, height: u16) -> ([Self; 4], usize) {
        let mut result = [self; 4];
        let mut count = 0;
        for direction in Direction::CARDINAL {
            if let Some(next) = self.translate(direction, width, height) {
                result[count] = next;
                count += 1;
            }
        }
        (result, count)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards y - 1.
    North,
    /// Towards x + 1.
    East,
    /// Towards y + 1.
    South,
    /// Towards x - 1.
    West,
    /// Stay in place.
    Center,
}

impl Direction {
    /// The four directions that change position.
    pub const CARDINAL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Parse a protocol direction letter.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "n" => Some(Self::North),
            "e" => Some(Self::East),
            "s" => Some(Self::South),
            "w" => Some(Self::West),
            "c" => Some(Self::Center),
            _ => None,
        }
    }

    /// Protocol letter for this direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "n",
            Self::East => "e",
            Self::South => "s",
            Self::West => "w",
            Self::Center => "c",
        }
    }
}

/// Kind of collectible resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Always collectible.
    Wood,
    /// Collectible after coal research.
    Coal,
    /// Collectible after uranium research.
    Uranium,
}

impl ResourceType {
    /// All resource types in fuel-burning priority order.
    pub const ALL: [Self; 3] = [Self::Wood, Self::Coal, Self::Uranium];

    /// Parse a protocol resource name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wood" => Some(Self::Wood),
            "coal" => Some(Self::Coal),
            "uranium" => Some(Self::Uranium),
            _ => None,
        }
    }

    /// Protocol name of this resource.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wood => "wood",
            Self::Coal => "coal",
            Self::Uranium => "uranium",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource deposit on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Remaining amount.
    pub amount: u32,
}

/// A single map cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Position of this cell.
    pub pos: Position,
    /// Resource deposit, if any.
    pub resource: Option<Resource>,
    /// Road level, reducing cooldown of units standing here.
    pub road: f64,
    /// Units currently on this cell.
    pub units: BTreeSet<UnitId>,
}

impl Cell {
    /// Whether a non-empty resource lies here.
    #[must_use]
    pub fn has_resource(&self) -> bool {
        self.resource.is_some_and(|r| r.amount > 0)
    }
}

/// The game map.
#[derive(Debug, Clone, PartialEq)]
pub struct GameMap {
    /// Width of the map in cells.
    width: u16,
    /// Height of the map in cells.
    height: u16,
    /// Cells stored in row-major order.
    cells: Vec<Cell>,
    /// Positions holding a resource, in deterministic order.
    resources: Vec<Position>,
}

impl GameMap {
    /// Create an empty map.
    ///
    /// Returns `None` if width or height is zero.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| Position::new(x, y)))
            .map(|pos| Cell {
                pos,
                resource: None,
                road: 0.0,
                units: BTreeSet::new(),
            })
            .collect();

        Some(Self {
            width,
            height,
            cells,
            resources: Vec::new(),
        })
    }

    /// Get the width of the map.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Get the height of the map.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Check if a position is within the map bounds.
    #[must_use]
    pub const fn in_bounds(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| usize::from(pos.y) * usize::from(self.width) + usize::from(pos.x))
    }

    /// Get the cell at a position.
    #[must_use]
    pub fn get(&self, pos: Position) -> Option<&Cell> {
        self.index(pos).map(|idx| &self.cells[idx])
    }

    /// Get a mutable cell at a position.
    #[must_use]
    pub fn get_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        self.index(pos).map(|idx| &mut self.cells[idx])
    }

    /// Iterate over all cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Iterate mutably over all cells in row-major order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.iter_mut()
    }

    /// Neighbors of a position inside the map.
    #[must_use]
    pub fn adjacent(&self, pos: Position) -> ([Position; 4], usize) {
        pos.adjacent(self.width, self.height)
    }

    /// Sort key used for every iteration over resource cells.
    #[must_use]
    pub fn sort_key(&self, pos: Position) -> u32 {
        let stride = u32::from(self.width.max(self.height));
        u32::from(pos.x) * stride + u32::from(pos.y)
    }

    /// Place a resource on a cell, registering it in the resource list.
    ///
    /// Returns `false` if the position is out of bounds.
    pub fn add_resource(&mut self, pos: Position, resource_type: ResourceType, amount: u32) -> bool {
        let Some(cell) = self.get_mut(pos) else {
            return false;
        };
        let was_registered = cell.resource.is_some();
        cell.resource = Some(Resource {
            resource_type,
            amount,
        });
        if !was_registered {
            self.resources.push(pos);
            self.sort_resources();
        }
        true
    }

    /// Positions of resource cells in deterministic `x * max(w, h) + y` order.
    #[must_use]
    pub fn resource_positions(&self) -> &[Position] {
        &self.resources
    }

    /// Resource cells of one type, in deterministic order.
    pub fn resources_of(&self, resource_type: ResourceType) -> impl Iterator<Item = &Cell> {
        self.resources.iter().filter_map(move |&pos| {
            self.get(pos)
                .filter(|cell| cell.resource.is_some_and(|r| r.resource_type == resource_type))
        })
    }

    fn sort_resources(&mut self) {
        let stride = u32::from(self.width.max(self.height));
        self.resources
            .sort_by_key(|pos| u32::from(pos.x) * stride + u32::from(pos.y));
    }

    /// Drop resource deposits whose amount reached zero.
    ///
    /// Returns the positions that were cleared.
    pub fn remove_depleted(&mut self) -> Vec<Position> {
        let mut cleared = Vec::new();
        let mut kept = Vec::with_capacity(self.resources.len());
        for pos in std::mem::take(&mut self.resources) {
            let Some(idx) = self.index(pos) else {
                continue;
            };
            let cell = &mut self.cells[idx];
            if cell.resource.is_some_and(|r| r.amount > 0) {
                kept.push(pos);
            } else {
                cell.resource = None;
                cleared.push(pos);
            }
        }
        self.resources = kept;
        cleared
    }

    /// Grow every wood deposit below `cap` by `rate`, rounding up.
    pub fn regrow_wood(&mut self, rate: f64, cap: u32) {
        for i in 0..self.resources.len() {
            let Some(idx) = self.index(self.resources[i]) else {
                continue;
            };
            let Some(resource) = self.cells[idx].resource.as_mut() else {
                continue;
            };
            if resource.resource_type == ResourceType::Wood && resource.amount < cap {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let grown = (f64::from(resource.amount) * rate).min(f64::from(cap)).ceil() as u32;
                resource.amount = grown;
            }
        }
    }

    /// Total amount of one resource type on the map.
    #[must_use]
    pub fn total_resource(&self, resource_type: ResourceType) -> u64 {
        self.resources_of(resource_type)
            .filter_map(|cell| cell.resource)
            .map(|r| u64::from(r.amount))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_adjacent() {
        let (adj, count) = Position::new(5, 5).adjacent(10, 10);
        assert_eq!(count, 4);
        assert_eq!(
            &adj[..count],
            &[
                Position::new(5, 4),
                Position::new(6, 5),
                Position::new(5, 6),
                Position::new(4, 5)
            ]
        );
    }

    #[test]
    fn test_position_adjacent_corner() {
        let (adj, count) = Position::new(0, 0).adjacent(10, 10);
        assert_eq!(count, 2);
        assert!(adj[..count].contains(&Position::new(1, 0)));
        assert!(adj[..count].contains(&Position::new(0, 1)));
    }

    #[test]
    fn test_translate_off_map() {
        let pos = Position::new(0, 3);
        assert_eq!(pos.translate(Direction::West, 4, 4), None);
        assert_eq!(pos.translate(Direction::South, 4, 4), None);
        assert_eq!(pos.translate(Direction::North, 4, 4), Some(Position::new(0, 2)));
        assert_eq!(pos.translate(Direction::Center, 4, 4), Some(pos));
    }

    #[test]
    fn test_map_zero_size() {
        assert!(GameMap::new(0, 10).is_none());
        assert!(GameMap::new(10, 0).is_none());
    }

    #[test]
    fn test_resources_sorted_deterministically() {
        let mut map = GameMap::new(8, 8).unwrap();
        map.add_resource(Position::new(3, 1), ResourceType::Wood, 10);
        map.add_resource(Position::new(1, 7), ResourceType::Coal, 10);
        map.add_resource(Position::new(3, 0), ResourceType::Wood, 10);
        assert_eq!(
            map.resource_positions(),
            &[Position::new(1, 7), Position::new(3, 0), Position::new(3, 1)]
        );
        assert_eq!(map.resources_of(ResourceType::Wood).count(), 2);
    }

    #[test]
    fn test_remove_depleted() {
        let mut map = GameMap::new(4, 4).unwrap();
        map.add_resource(Position::new(1, 1), ResourceType::Wood, 0);
        map.add_resource(Position::new(2, 2), ResourceType::Wood, 5);
        let cleared = map.remove_depleted();
        assert_eq!(cleared, vec![Position::new(1, 1)]);
        assert!(map.get(Position::new(1, 1)).unwrap().resource.is_none());
        assert_eq!(map.resource_positions(), &[Position::new(2, 2)]);
    }

    #[test]
    fn test_regrow_wood_rounds_up_and_caps() {
        let mut map = GameMap::new(4, 4).unwrap();
        map.add_resource(Position::new(0, 0), ResourceType::Wood, 100);
        map.add_resource(Position::new(1, 0), ResourceType::Wood, 499);
        map.add_resource(Position::new(2, 0), ResourceType::Coal, 100);
        map.regrow_wood(1.025, 500);
        let amount = |x| map.get(Position::new(x, 0)).unwrap().resource.unwrap().amount;
        assert_eq!(amount(0), 103);
        assert_eq!(amount(1), 500);
        assert_eq!(amount(2), 100);
    }
}
