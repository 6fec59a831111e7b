//! Fair allocation of resource cells to collecting workers.
//!
//! Collection runs once per resource type (uranium, coal, wood; cargo space is
//! shared, so the order matters). For one type it proceeds in rounds:
//!
//! 1. every eligible worker spreads its free cargo space over the cells it
//!    can reach that still hold resource, capped by what it may still take
//!    from each cell this turn;
//! 2. every cell, in `x * max(w, h) + y` order, grants all asks if it can.
//!    Otherwise it water-fills: asks are served smallest first, and once an
//!    ask exceeds the equal share of what is left, every remaining asker
//!    receives that share;
//! 3. rounds repeat until one grants nothing.
//!
//! Integer division never rounds up, so a remainder smaller than the number
//! of askers stays in the cell.

use std::collections::BTreeMap;

use crate::config::Parameters;
use crate::game::{GameMap, Position, Registry, ResourceType, Team, UnitId};

/// Resources moved from one cell to one unit this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Receiving unit.
    pub unit: UnitId,
    /// Source cell.
    pub pos: Position,
    /// Resource type.
    pub resource: ResourceType,
    /// Amount moved.
    pub amount: u32,
}

#[derive(Debug)]
struct Pair {
    pos: Position,
    request: u32,
}

#[derive(Debug)]
struct Collector {
    id: UnitId,
    space: u32,
    pairs: Vec<Pair>,
}

#[derive(Debug)]
struct Ask {
    amount: u32,
    unit: UnitId,
    collector: usize,
    pair: usize,
}

/// Split `available` among asks sorted ascending.
///
/// Returns the grant for each ask, in the same order. Asks that fit under
/// the equal share of the remainder are served in full; the rest receive
/// that share.
#[must_use]
pub fn water_fill(available: u32, asks: &[u32]) -> Vec<u32> {
    let total: u64 = asks.iter().map(|&a| u64::from(a)).sum();
    if total <= u64::from(available) {
        return asks.to_vec();
    }

    let mut grants = Vec::with_capacity(asks.len());
    let mut remaining = available;
    for (i, &ask) in asks.iter().enumerate() {
        let left = u32::try_from(asks.len() - i).unwrap_or(u32::MAX);
        let share = remaining / left;
        if ask <= share {
            grants.push(ask);
            remaining -= ask;
        } else {
            grants.extend(std::iter::repeat_n(share, asks.len() - i));
            break;
        }
    }
    grants
}

fn unlocked(registry: &Registry, team: Team, resource: ResourceType) -> bool {
    let researched = registry.team(team).researched;
    match resource {
        ResourceType::Wood => true,
        ResourceType::Coal => researched.coal,
        ResourceType::Uranium => researched.uranium,
    }
}

fn eligible_collectors(
    map: &GameMap,
    registry: &Registry,
    params: &Parameters,
    resource: ResourceType,
) -> Vec<Collector> {
    let rate = params.worker_collection_rate.get(resource);
    registry
        .units()
        .filter(|u| u.is_worker() && !registry.is_city_tile(u.pos))
        .filter(|u| unlocked(registry, u.team, resource))
        .filter_map(|u| {
            let space = u.space_left(params);
            if space == 0 {
                return None;
            }
            let (adjacent, count) = map.adjacent(u.pos);
            let mut cells: Vec<Position> = std::iter::once(u.pos)
                .chain(adjacent[..count].iter().copied())
                .filter(|&p| {
                    map.get(p).is_some_and(|c| {
                        c.resource
                            .is_some_and(|r| r.resource_type == resource && r.amount > 0)
                    })
                })
                .collect();
            if cells.is_empty() {
                return None;
            }
            cells.sort_by_key(|&p| map.sort_key(p));
            let request = rate.min(space);
            Some(Collector {
                id: u.id,
                space,
                pairs: cells.into_iter().map(|pos| Pair { pos, request }).collect(),
            })
        })
        .collect()
}

fn amount_at(map: &GameMap, pos: Position) -> u32 {
    map.get(pos)
        .and_then(|c| c.resource)
        .map_or(0, |r| r.amount)
}

/// Gather the asks of one round, grouped by cell in sort order.
fn round_asks(map: &GameMap, collectors: &[Collector]) -> BTreeMap<u32, (Position, Vec<Ask>)> {
    let mut by_cell: BTreeMap<u32, (Position, Vec<Ask>)> = BTreeMap::new();
    for (ci, collector) in collectors.iter().enumerate() {
        if collector.space == 0 {
            continue;
        }
        let live: Vec<usize> = collector
            .pairs
            .iter()
            .enumerate()
            .filter(|(_, pair)| pair.request > 0 && amount_at(map, pair.pos) > 0)
            .map(|(pi, _)| pi)
            .collect();
        let Ok(n) = u32::try_from(live.len()) else {
            continue;
        };
        if n == 0 {
            continue;
        }
        let base = collector.space / n;
        let extra = collector.space % n;
        for (k, &pi) in (0u32..).zip(live.iter()) {
            let share = base + u32::from(k < extra);
            let pair = &collector.pairs[pi];
            let amount = share.min(pair.request);
            if amount == 0 {
                continue;
            }
            by_cell
                .entry(map.sort_key(pair.pos))
                .or_insert_with(|| (pair.pos, Vec::new()))
                .1
                .push(Ask {
                    amount,
                    unit: collector.id,
                    collector: ci,
                    pair: pi,
                });
        }
    }
    by_cell
}

fn distribute_resource(
    map: &mut GameMap,
    registry: &mut Registry,
    params: &Parameters,
    resource: ResourceType,
    totals: &mut BTreeMap<(UnitId, Position, ResourceType), u32>,
) {
    let mut collectors = eligible_collectors(map, registry, params, resource);
    if collectors.is_empty() {
        return;
    }

    loop {
        let asks = round_asks(map, &collectors);
        let mut granted_this_round = 0u64;

        for (_, (pos, mut cell_asks)) in asks {
            let available = amount_at(map, pos);
            cell_asks.sort_by_key(|a| (a.amount, a.unit));
            let amounts: Vec<u32> = cell_asks.iter().map(|a| a.amount).collect();
            let grants = water_fill(available, &amounts);

            let mut taken = 0u32;
            for (ask, grant) in cell_asks.iter().zip(grants) {
                if grant == 0 {
                    continue;
                }
                let collector = &mut collectors[ask.collector];
                collector.space -= grant;
                collector.pairs[ask.pair].request -= grant;
                if let Some(unit) = registry.unit_mut(ask.unit) {
                    *unit.cargo.get_mut(resource) += grant;
                }
                *totals.entry((ask.unit, pos, resource)).or_insert(0) += grant;
                taken += grant;
            }
            if let Some(r) = map.get_mut(pos).and_then(|c| c.resource.as_mut()) {
                r.amount -= taken;
            }
            granted_this_round += u64::from(taken);
        }

        if granted_this_round == 0 {
            break;
        }
    }
}

/// Run collection for every resource type and apply the grants.
///
/// Returns the grants per unit and cell, ordered by unit id.
pub fn distribute_all_resources(
    map: &mut GameMap,
    registry: &mut Registry,
    params: &Parameters,
) -> Vec<Grant> {
    let mut totals = BTreeMap::new();
    for resource in [ResourceType::Uranium, ResourceType::Coal, ResourceType::Wood] {
        distribute_resource(map, registry, params, resource, &mut totals);
    }
    totals
        .into_iter()
        .map(|((unit, pos, resource), amount)| Grant {
            unit,
            pos,
            resource,
            amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Unit, UnitType};

    const RATE: u32 = 20;

    fn create_test_world() -> (GameMap, Registry, Parameters) {
        (GameMap::new(16, 16).unwrap(), Registry::new(), Parameters::default())
    }

    fn worker(registry: &mut Registry, team: Team, x: u16, y: u16, wood: u32) -> UnitId {
        let id = registry.ids.next_unit();
        let mut unit = Unit::new(id, team, UnitType::Worker, Position::new(x, y));
        unit.cargo.wood = wood;
        registry.insert_unit(unit);
        id
    }

    fn wood(registry: &Registry, id: UnitId) -> u32 {
        registry.unit(id).unwrap().cargo.wood
    }

    fn left(map: &GameMap, x: u16, y: u16) -> u32 {
        amount_at(map, Position::new(x, y))
    }

    #[test]
    fn test_water_fill() {
        assert_eq!(water_fill(100, &[10, 20]), vec![10, 20]);
        assert_eq!(water_fill(20, &[20, 20]), vec![10, 10]);
        assert_eq!(water_fill(21, &[20, 20]), vec![10, 10]);
        assert_eq!(water_fill(20, &[3, 20, 20]), vec![3, 8, 8]);
        assert_eq!(water_fill(1, &[5, 5, 5]), vec![0, 0, 0]);
        assert_eq!(water_fill(0, &[]), Vec::<u32>::new());
    }

    #[test]
    fn test_abundant_cell_gives_full_rate() {
        let (mut map, mut registry, params) = create_test_world();
        map.add_resource(Position::new(4, 4), ResourceType::Wood, RATE * 10);
        let w1 = worker(&mut registry, Team::A, 4, 4, 0);
        let w2 = worker(&mut registry, Team::B, 4, 5, 0);
        distribute_all_resources(&mut map, &mut registry, &params);
        assert_eq!(wood(&registry, w1), RATE);
        assert_eq!(wood(&registry, w2), RATE);
        assert_eq!(left(&map, 4, 4), RATE * 8);
    }

    #[test]
    fn test_scarce_cell_floor_split() {
        let (mut map, mut registry, params) = create_test_world();
        map.add_resource(Position::new(4, 4), ResourceType::Wood, RATE);
        let w1 = worker(&mut registry, Team::A, 4, 4, 0);
        let w2 = worker(&mut registry, Team::B, 4, 5, 0);
        distribute_all_resources(&mut map, &mut registry, &params);
        assert_eq!(wood(&registry, w1), RATE / 2);
        assert_eq!(wood(&registry, w2), RATE / 2);
        assert_eq!(left(&map, 4, 4), 0);
    }

    #[test]
    fn test_odd_remainder_stays_in_cell() {
        let (mut map, mut registry, params) = create_test_world();
        map.add_resource(Position::new(4, 4), ResourceType::Wood, RATE + 1);
        let w1 = worker(&mut registry, Team::A, 4, 4, 0);
        let w2 = worker(&mut registry, Team::B, 4, 5, 0);
        distribute_all_resources(&mut map, &mut registry, &params);
        assert_eq!(wood(&registry, w1), RATE / 2);
        assert_eq!(wood(&registry, w2), RATE / 2);
        assert_eq!(left(&map, 4, 4), 1);
    }

    #[test]
    fn test_limited_space_abundant_cell() {
        let (mut map, mut registry, params) = create_test_world();
        map.add_resource(Position::new(4, 4), ResourceType::Wood, RATE * 10);
        let w1 = worker(&mut registry, Team::A, 4, 4, 100 - RATE / 2);
        let w2 = worker(&mut registry, Team::B, 4, 5, 0);
        let w3 = worker(&mut registry, Team::B, 4, 3, 0);
        distribute_all_resources(&mut map, &mut registry, &params);
        assert_eq!(wood(&registry, w1), 100);
        assert_eq!(wood(&registry, w2), RATE);
        assert_eq!(wood(&registry, w3), RATE);
        assert_eq!(left(&map, 4, 4), 150);
    }

    #[test]
    fn test_limited_space_scarce_cell() {
        let (mut map, mut registry, params) = create_test_world();
        map.add_resource(Position::new(4, 4), ResourceType::Wood, RATE);
        let w1 = worker(&mut registry, Team::A, 4, 4, 100 - RATE / 6);
        let w2 = worker(&mut registry, Team::B, 4, 5, 0);
        let w3 = worker(&mut registry, Team::B, 4, 3, 0);
        distribute_all_resources(&mut map, &mut registry, &params);
        assert_eq!(wood(&registry, w1), 100);
        assert_eq!(wood(&registry, w2), 8);
        assert_eq!(wood(&registry, w3), 8);
        assert_eq!(left(&map, 4, 4), 1);
    }

    #[test]
    fn test_space_spread_over_cells_in_sort_order() {
        let (mut map, mut registry, params) = create_test_world();
        for y in 3..=5 {
            map.add_resource(Position::new(4, y), ResourceType::Wood, RATE);
        }
        let w1 = worker(&mut registry, Team::A, 4, 4, 100 - RATE * 2);
        distribute_all_resources(&mut map, &mut registry, &params);
        assert_eq!(wood(&registry, w1), 100);
        assert_eq!(left(&map, 4, 3), 6);
        assert_eq!(left(&map, 4, 4), 7);
        assert_eq!(left(&map, 4, 5), 7);
    }

    #[test]
    fn test_contested_cells_then_second_round() {
        let (mut map, mut registry, params) = create_test_world();
        for y in 3..=5 {
            map.add_resource(Position::new(4, y), ResourceType::Wood, RATE);
        }
        let w1 = worker(&mut registry, Team::A, 4, 4, 100 - RATE * 2);
        let w2 = worker(&mut registry, Team::A, 4, 5, 0);
        let grants = distribute_all_resources(&mut map, &mut registry, &params);
        // contested cells split 10/10; the free cell tops w1 up in a later round
        assert_eq!(wood(&registry, w1), 100);
        assert_eq!(wood(&registry, w2), 20);
        assert_eq!(left(&map, 4, 3), 0);
        assert_eq!(left(&map, 4, 4), 0);
        assert_eq!(left(&map, 4, 5), 0);
        let from_north: u32 = grants
            .iter()
            .filter(|g| g.unit == w1 && g.pos == Position::new(4, 3))
            .map(|g| g.amount)
            .sum();
        assert_eq!(from_north, 20);
    }

    #[test]
    fn test_five_cells_even_spread() {
        let (mut map, mut registry, params) = create_test_world();
        let cells = [(4, 4), (4, 3), (3, 4), (5, 4), (4, 5)];
        for (x, y) in cells {
            map.add_resource(Position::new(x, y), ResourceType::Wood, RATE);
        }
        let w1 = worker(&mut registry, Team::A, 4, 4, 100 - RATE * 2);
        distribute_all_resources(&mut map, &mut registry, &params);
        assert_eq!(wood(&registry, w1), 100);
        for (x, y) in cells {
            assert_eq!(left(&map, x, y), 12);
        }
    }

    #[test]
    fn test_research_gates_and_city_tiles_and_carts() {
        let (mut map, mut registry, params) = create_test_world();
        map.add_resource(Position::new(4, 3), ResourceType::Coal, 50);
        map.add_resource(Position::new(5, 4), ResourceType::Uranium, 50);
        map.add_resource(Position::new(3, 3), ResourceType::Wood, 50);
        registry.team_mut(Team::A).researched.coal = true;
        let w1 = worker(&mut registry, Team::A, 4, 4, 0);

        registry.add_city_tile(Team::B, Position::new(3, 2));
        let on_city = worker(&mut registry, Team::B, 3, 2, 0);
        let cart = registry.ids.next_unit();
        registry.insert_unit(Unit::new(cart, Team::B, UnitType::Cart, Position::new(2, 3)));

        distribute_all_resources(&mut map, &mut registry, &params);
        let unit = registry.unit(w1).unwrap();
        assert_eq!(unit.cargo.coal, 5);
        assert_eq!(unit.cargo.uranium, 0);
        assert_eq!(registry.unit(on_city).unwrap().cargo.total(), 0);
        assert_eq!(registry.unit(cart).unwrap().cargo.total(), 0);
        assert_eq!(left(&map, 3, 3), 50);
    }

    #[test]
    fn test_resource_order_shares_space() {
        let (mut map, mut registry, params) = create_test_world();
        map.add_resource(Position::new(4, 3), ResourceType::Uranium, 50);
        map.add_resource(Position::new(4, 5), ResourceType::Wood, 50);
        registry.team_mut(Team::A).researched.coal = true;
        registry.team_mut(Team::A).researched.uranium = true;
        let w1 = worker(&mut registry, Team::A, 4, 4, 95);
        distribute_all_resources(&mut map, &mut registry, &params);
        let unit = registry.unit(w1).unwrap();
        // uranium is collected first and takes 2 of the 5 free slots
        assert_eq!(unit.cargo.uranium, 2);
        assert_eq!(unit.cargo.wood, 98);
    }
}
