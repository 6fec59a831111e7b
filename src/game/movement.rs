//! Simultaneous movement with collision cancellation.
//!
//! All moves of a turn are resolved together. A unit's destination is its
//! move target if it moves, or its current cell otherwise. Whenever two or
//! more units would end on the same cell that is not a city tile, every move
//! into that cell is cancelled and the check repeats, since a cancelled unit
//! now occupies its origin cell. Each pass cancels at least one move or
//! stops, so the loop ends within `moves + 1` passes.

use std::collections::{BTreeMap, BTreeSet};

use crate::game::{MoveAction, Position, Registry, UnitId};

/// Drop colliding moves until the remaining set is collision free.
///
/// Center moves are dropped first. The surviving moves are returned in
/// their input order.
#[must_use]
pub fn resolve_movement(registry: &Registry, moves: &[MoveAction]) -> Vec<MoveAction> {
    let mut active: BTreeMap<UnitId, Position> = moves
        .iter()
        .filter(|m| registry.unit(m.unit).is_some_and(|u| u.pos != m.target))
        .map(|m| (m.unit, m.target))
        .collect();

    loop {
        let mut destinations: BTreeMap<Position, Vec<UnitId>> = BTreeMap::new();
        for unit in registry.units() {
            let dest = active.get(&unit.id).copied().unwrap_or(unit.pos);
            destinations.entry(dest).or_default().push(unit.id);
        }

        let mut cancelled: BTreeSet<UnitId> = BTreeSet::new();
        for (pos, ids) in &destinations {
            if ids.len() > 1 && !registry.is_city_tile(*pos) {
                cancelled.extend(ids.iter().copied().filter(|id| active.contains_key(id)));
            }
        }

        if cancelled.is_empty() {
            break;
        }
        tracing::trace!(count = cancelled.len(), "cancelled colliding moves");
        for id in cancelled {
            active.remove(&id);
        }
    }

    moves
        .iter()
        .filter(|m| active.get(&m.unit) == Some(&m.target))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Direction, Team, Unit, UnitType};

    fn add(registry: &mut Registry, team: Team, x: u16, y: u16) -> UnitId {
        let id = registry.ids.next_unit();
        registry.insert_unit(Unit::new(id, team, UnitType::Worker, Position::new(x, y)));
        id
    }

    fn mv(registry: &Registry, unit: UnitId, x: u16, y: u16) -> MoveAction {
        MoveAction {
            unit,
            team: registry.unit(unit).map_or(Team::A, |u| u.team),
            direction: Direction::East,
            target: Position::new(x, y),
        }
    }

    #[test]
    fn test_two_units_into_same_cell_both_cancelled() {
        let mut registry = Registry::new();
        let a = add(&mut registry, Team::A, 1, 1);
        let b = add(&mut registry, Team::B, 3, 1);
        let moves = [mv(&registry, a, 2, 1), mv(&registry, b, 2, 1)];
        assert!(resolve_movement(&registry, &moves).is_empty());
    }

    #[test]
    fn test_city_tile_allows_stacking() {
        let mut registry = Registry::new();
        registry.add_city_tile(Team::A, Position::new(2, 1));
        let a = add(&mut registry, Team::A, 1, 1);
        let b = add(&mut registry, Team::A, 3, 1);
        let moves = [mv(&registry, a, 2, 1), mv(&registry, b, 2, 1)];
        assert_eq!(resolve_movement(&registry, &moves).len(), 2);
    }

    #[test]
    fn test_move_into_stationary_unit_cancelled() {
        let mut registry = Registry::new();
        let a = add(&mut registry, Team::A, 1, 1);
        add(&mut registry, Team::B, 2, 1);
        assert!(resolve_movement(&registry, &[mv(&registry, a, 2, 1)]).is_empty());
    }

    #[test]
    fn test_cancellation_cascades() {
        // c blocks b's target, so b stays and then blocks a
        let mut registry = Registry::new();
        let a = add(&mut registry, Team::A, 0, 0);
        let b = add(&mut registry, Team::A, 1, 0);
        let c = add(&mut registry, Team::B, 3, 0);
        let d = add(&mut registry, Team::B, 2, 1);
        let moves = [
            mv(&registry, a, 1, 0),
            mv(&registry, b, 2, 0),
            mv(&registry, c, 2, 0),
            mv(&registry, d, 2, 2),
        ];
        let resolved = resolve_movement(&registry, &moves);
        assert_eq!(resolved, vec![moves[3]]);
    }

    #[test]
    fn test_swap_is_legal() {
        let mut registry = Registry::new();
        let a = add(&mut registry, Team::A, 1, 1);
        let b = add(&mut registry, Team::B, 2, 1);
        let moves = [mv(&registry, a, 2, 1), mv(&registry, b, 1, 1)];
        assert_eq!(resolve_movement(&registry, &moves).len(), 2);
    }

    #[test]
    fn test_chain_following_is_legal() {
        let mut registry = Registry::new();
        let a = add(&mut registry, Team::A, 1, 1);
        let b = add(&mut registry, Team::A, 2, 1);
        let moves = [mv(&registry, a, 2, 1), mv(&registry, b, 3, 1)];
        assert_eq!(resolve_movement(&registry, &moves), moves.to_vec());
    }

    #[test]
    fn test_center_moves_dropped() {
        let mut registry = Registry::new();
        let a = add(&mut registry, Team::A, 1, 1);
        assert!(resolve_movement(&registry, &[mv(&registry, a, 1, 1)]).is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut registry = Registry::new();
        let a = add(&mut registry, Team::A, 0, 0);
        let b = add(&mut registry, Team::B, 2, 0);
        let c = add(&mut registry, Team::A, 4, 4);
        let moves = [
            mv(&registry, a, 1, 0),
            mv(&registry, b, 1, 0),
            mv(&registry, c, 4, 3),
        ];
        let once = resolve_movement(&registry, &moves);
        assert_eq!(resolve_movement(&registry, &once), once);
    }
}
