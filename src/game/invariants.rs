//! Game invariants - sanity checks that detect bugs.
//!
//! These should never trigger for a state produced by [`resolve_turn`]
//! or restored from a valid snapshot. Batch runs, property tests and fuzz
//! targets call [`check_invariants`] after every turn.
//!
//! Units left standing together on a city tile that burned down are the one
//! kind of stack allowed off a city tile. Such a stack only ever holds units
//! of one team, so a non-city cell shared by both teams is still a violation,
//! as is a unit on the opponent's city tile.
//!
//! [`resolve_turn`]: crate::game::resolve_turn

use std::collections::BTreeSet;

use crate::game::{GameState, Position, Team};

/// Invariant violation error.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

fn valid_cooldown(cooldown: f64) -> bool {
    cooldown.is_finite() && cooldown >= 0.0
}

fn is_connected(state: &GameState, cells: &[Position]) -> bool {
    let members: BTreeSet<Position> = cells.iter().copied().collect();
    let Some(&start) = cells.first() else {
        return true;
    };
    let mut seen = BTreeSet::from([start]);
    let mut stack = vec![start];
    while let Some(pos) = stack.pop() {
        let (adjacent, count) = state.map.adjacent(pos);
        for &n in &adjacent[..count] {
            if members.contains(&n) && seen.insert(n) {
                stack.push(n);
            }
        }
    }
    seen.len() == members.len()
}

/// Check all game invariants.
///
/// Returns a list of violations found, or empty if all invariants hold.
#[must_use]
pub fn check_invariants(state: &GameState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut fail = |message: String| violations.push(InvariantViolation { message });
    let params = state.params();
    let registry = &state.registry;

    // Cells: road bounds, unit membership, who may share a cell
    for cell in state.map.iter() {
        if !(params.min_road..=params.max_road).contains(&cell.road) {
            fail(format!("Road {} at {} outside bounds", cell.road, cell.pos));
        }
        let mut teams = BTreeSet::new();
        for &id in &cell.units {
            match registry.unit(id) {
                Some(unit) if unit.pos == cell.pos => {
                    teams.insert(unit.team);
                }
                Some(unit) => fail(format!(
                    "Cell {} lists {id} which is at {}",
                    cell.pos, unit.pos
                )),
                None => fail(format!("Cell {} lists missing unit {id}", cell.pos)),
            }
        }
        match registry.city_tile(cell.pos) {
            Some(tile) if teams.iter().any(|&t| t != tile.team) => fail(format!(
                "Opponent units stand on a city tile of team {} at {}",
                tile.team, cell.pos
            )),
            None if teams.len() > 1 => fail(format!("Units of both teams share {}", cell.pos)),
            _ => {}
        }
    }

    // Resource list agrees with the grid
    for &pos in state.map.resource_positions() {
        if state.map.get(pos).is_none_or(|c| c.resource.is_none()) {
            fail(format!("Resource list names {pos} which holds nothing"));
        }
    }

    // Units
    for team in Team::ALL {
        for (&id, unit) in &registry.team(team).units {
            if id != unit.id || unit.team != team {
                fail(format!("{id} filed under the wrong key or team"));
            }
            if id.0 > registry.ids.last_unit {
                fail(format!("{id} exceeds the unit id counter"));
            }
            let capacity = unit.capacity(params);
            if unit.cargo.total() > capacity {
                fail(format!(
                    "{id} carries {} over capacity {capacity}",
                    unit.cargo.total()
                ));
            }
            if !valid_cooldown(unit.cooldown) {
                fail(format!("{id} has cooldown {}", unit.cooldown));
            }
            if state.map.get(unit.pos).is_none_or(|c| !c.units.contains(&id)) {
                fail(format!("{id} is not registered on its cell {}", unit.pos));
            }
        }
    }

    // Cities and tiles
    for (&id, city) in &registry.cities {
        if city.cells.is_empty() {
            fail(format!("{id} has no tiles"));
        }
        if id.0 > registry.ids.last_city {
            fail(format!("{id} exceeds the city id counter"));
        }
        if !(city.fuel.is_finite() && city.fuel >= 0.0) {
            fail(format!("{id} has fuel {}", city.fuel));
        }
        if !is_connected(state, &city.cells) {
            fail(format!("{id} tiles are not connected"));
        }
        for &pos in &city.cells {
            match registry.city_tile(pos) {
                Some(tile) if tile.city_id == id && tile.team == city.team => {}
                _ => fail(format!("{id} lists {pos} but the tile does not point back")),
            }
        }
    }
    for (&pos, tile) in &registry.city_tiles {
        if !registry.cities.contains_key(&tile.city_id) {
            fail(format!("Tile at {pos} belongs to missing {}", tile.city_id));
        }
        if !valid_cooldown(tile.cooldown) {
            fail(format!("Tile at {pos} has cooldown {}", tile.cooldown));
        }
        let (adjacent, count) = state.map.adjacent(pos);
        let mut expected = 0;
        for &n in &adjacent[..count] {
            let Some(other) = registry.city_tile(n).filter(|t| t.team == tile.team) else {
                continue;
            };
            expected += 1;
            if other.city_id != tile.city_id && pos < n {
                fail(format!(
                    "Adjacent tiles at {pos} and {n} belong to different cities"
                ));
            }
        }
        if usize::try_from(tile.adjacent).ok() != Some(expected) {
            fail(format!(
                "Tile at {pos} counts {} neighbors, expected {expected}",
                tile.adjacent
            ));
        }
    }

    violations
}

/// Assert all game invariants hold, panicking if any are violated.
///
/// Only active in debug builds. No-op in release builds.
///
/// # Panics
///
/// Panics with detailed message if any invariant is violated.
#[cfg(debug_assertions)]
pub fn assert_invariants(state: &GameState) {
    let violations = check_invariants(state);
    if !violations.is_empty() {
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        panic!("Game invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants(_state: &GameState) {}
