//! Multi-turn integration tests for turn resolution.
//!
//! These drive `resolve_turn` through the public API only: the worked
//! collection, cooldown, starvation, night upkeep and collision scenarios,
//! plus determinism across runs and across a snapshot restore.
//!
//! Run with: cargo test --release turn_integration

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use duskfall::config::GameConfig;
use duskfall::game::{
    GameState, Position, ResourceType, Snapshot, Team, UnitId, UnitType, check_invariants,
};
use duskfall::protocol::{Command, DONE_MARKER, encode_state};
use duskfall::resolve_turn;
use duskfall::tournament::{CommandSource, RandomCommands, generate_map};

fn empty_state(width: u16, height: u16) -> GameState {
    GameState::new(GameConfig {
        width,
        height,
        ..GameConfig::default()
    })
    .unwrap()
}

fn cargo_wood(state: &GameState, id: UnitId) -> u32 {
    state.registry.unit(id).unwrap().cargo.wood
}

#[test]
fn test_abundant_wood_gives_everyone_the_full_rate() {
    let mut state = empty_state(6, 6);
    state.map.add_resource(Position::new(2, 2), ResourceType::Wood, 200);
    let a = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(1, 2))
        .unwrap();
    let b = state
        .spawn_unit(Team::B, UnitType::Worker, Position::new(3, 2))
        .unwrap();

    resolve_turn(&mut state, &[]);

    assert_eq!(cargo_wood(&state, a), 20);
    assert_eq!(cargo_wood(&state, b), 20);
    // 200 - 2 * 20, then regrown by 2.5% and rounded up
    let cell = state.map.get(Position::new(2, 2)).unwrap();
    assert_eq!(cell.resource.unwrap().amount, 164);
}

#[test]
fn test_scarce_wood_is_split_evenly() {
    let mut state = empty_state(6, 6);
    state.map.add_resource(Position::new(2, 2), ResourceType::Wood, 20);
    let a = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(2, 1))
        .unwrap();
    let b = state
        .spawn_unit(Team::B, UnitType::Worker, Position::new(2, 3))
        .unwrap();

    resolve_turn(&mut state, &[]);

    assert_eq!(cargo_wood(&state, a), 10);
    assert_eq!(cargo_wood(&state, b), 10);
    assert!(state.map.get(Position::new(2, 2)).unwrap().resource.is_none());
    assert!(state.map.resource_positions().is_empty());
}

#[test]
fn test_road_speeds_up_cooldown() {
    let mut state = empty_state(6, 6);
    let fast = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(2, 2))
        .unwrap();
    let slow = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(4, 4))
        .unwrap();
    state.map.get_mut(Position::new(2, 2)).unwrap().road = 3.0;
    state.registry.unit_mut(fast).unwrap().cooldown = 4.0;
    state.registry.unit_mut(slow).unwrap().cooldown = 4.0;

    resolve_turn(&mut state, &[]);

    assert!(state.registry.unit(fast).unwrap().cooldown.abs() < f64::EPSILON);
    assert!((state.registry.unit(slow).unwrap().cooldown - 3.0).abs() < f64::EPSILON);
}

#[test]
fn test_starving_city_is_removed_whole() {
    let mut state = empty_state(8, 8);
    let starving = state.spawn_city_tile(Team::A, Position::new(1, 1)).unwrap();
    state.spawn_city_tile(Team::A, Position::new(1, 2)).unwrap();
    let fed = state.spawn_city_tile(Team::B, Position::new(5, 5)).unwrap();
    state.spawn_unit(Team::A, UnitType::Cart, Position::new(1, 1)).unwrap();
    state.registry.cities.get_mut(&starving).unwrap().fuel = 10.0;
    state.registry.cities.get_mut(&fed).unwrap().fuel = 100.0;
    state.turn = 30;
    assert!(state.is_night());

    let outcome = resolve_turn(&mut state, &[]);

    assert_eq!(outcome.report.destroyed_cities, vec![starving]);
    assert!(!state.registry.cities.contains_key(&starving));
    assert!(!state.registry.is_city_tile(Position::new(1, 1)));
    assert!(!state.registry.is_city_tile(Position::new(1, 2)));
    assert!(state.map.get(Position::new(1, 1)).unwrap().road.abs() < f64::EPSILON);
    // The cart lost its shelter and had nothing to burn
    assert_eq!(state.unit_count(Team::A), 0);
    let fuel = state.registry.cities[&fed].fuel;
    assert!((fuel - 77.0).abs() < f64::EPSILON);
}

#[test]
fn test_units_off_city_burn_cargo_at_night() {
    let mut state = empty_state(8, 8);
    let on_wood = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(1, 1))
        .unwrap();
    let on_coal = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(3, 1))
        .unwrap();
    let empty = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(5, 1))
        .unwrap();
    state.registry.unit_mut(on_wood).unwrap().cargo.wood = 10;
    state.registry.unit_mut(on_coal).unwrap().cargo.coal = 1;
    state.turn = 30;

    let outcome = resolve_turn(&mut state, &[]);

    // 4 fuel of worker upkeep: 4 wood, or one whole coal
    assert_eq!(cargo_wood(&state, on_wood), 6);
    assert_eq!(state.registry.unit(on_coal).unwrap().cargo.coal, 0);
    assert_eq!(outcome.report.destroyed_units, vec![empty]);
    assert!(state.registry.unit(empty).is_none());
    assert!(state.map.get(Position::new(5, 1)).unwrap().units.is_empty());
    assert_eq!(state.unit_count(Team::A), 2);
}

#[test]
fn test_units_left_on_a_burned_city_tile_stay_until_they_move() {
    let mut config = GameConfig {
        width: 6,
        height: 6,
        ..GameConfig::default()
    };
    config.parameters.light_upkeep.worker = 0.0;
    let mut state = GameState::new(config).unwrap();
    let stack = Position::new(2, 2);
    let burned = state.spawn_city_tile(Team::A, stack).unwrap();
    let lit = state.spawn_city_tile(Team::B, Position::new(5, 5)).unwrap();
    state.registry.cities.get_mut(&lit).unwrap().fuel = 1000.0;
    let a = state.spawn_unit(Team::A, UnitType::Worker, stack).unwrap();
    let b = state.spawn_unit(Team::A, UnitType::Worker, stack).unwrap();
    let c = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(3, 2))
        .unwrap();
    state.turn = 30;

    let outcome = resolve_turn(&mut state, &[]);

    assert_eq!(outcome.report.destroyed_cities, vec![burned]);
    assert!(outcome.report.destroyed_units.is_empty());
    assert!(!state.registry.is_city_tile(stack));
    assert_eq!(state.map.get(stack).unwrap().units.len(), 2);
    assert!(check_invariants(&state).is_empty());

    // a leaves the stack; c cannot join what remains of it
    let commands = [
        Command::new(Team::A, format!("m {a} n")),
        Command::new(Team::A, format!("m {c} w")),
    ];
    let outcome = resolve_turn(&mut state, &commands);

    assert!(outcome.report.rejected.is_empty());
    assert_eq!(state.registry.unit(a).unwrap().pos, Position::new(2, 1));
    assert_eq!(state.registry.unit(c).unwrap().pos, Position::new(3, 2));
    let left: Vec<UnitId> = state.map.get(stack).unwrap().units.iter().copied().collect();
    assert_eq!(left, vec![b]);
    assert!(check_invariants(&state).is_empty());
}

#[test]
fn test_colliding_moves_are_both_cancelled() {
    let mut state = empty_state(6, 6);
    let a = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(1, 1))
        .unwrap();
    let b = state
        .spawn_unit(Team::B, UnitType::Worker, Position::new(3, 1))
        .unwrap();

    let commands = [
        Command::new(Team::A, format!("m {a} e")),
        Command::new(Team::B, format!("m {b} w")),
    ];
    let outcome = resolve_turn(&mut state, &commands);

    assert!(outcome.report.rejected.is_empty());
    assert_eq!(state.registry.unit(a).unwrap().pos, Position::new(1, 1));
    assert_eq!(state.registry.unit(b).unwrap().pos, Position::new(3, 1));
}

#[test]
fn test_moves_onto_a_city_tile_may_stack() {
    let mut state = empty_state(6, 6);
    state.spawn_city_tile(Team::A, Position::new(2, 1)).unwrap();
    let a = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(1, 1))
        .unwrap();
    let b = state
        .spawn_unit(Team::A, UnitType::Worker, Position::new(3, 1))
        .unwrap();

    let commands = [
        Command::new(Team::A, format!("m {a} e")),
        Command::new(Team::A, format!("m {b} w")),
    ];
    resolve_turn(&mut state, &commands);

    let cell = state.map.get(Position::new(2, 1)).unwrap();
    assert_eq!(cell.units.len(), 2);
}

#[test]
fn test_identical_runs_stay_identical() {
    let config = GameConfig {
        width: 12,
        height: 12,
        seed: 7,
        ..GameConfig::default()
    };
    let mut a = generate_map(config).unwrap();
    let mut b = generate_map(config).unwrap();
    let mut bot = RandomCommands::new(7);

    for _ in 0..60 {
        if a.is_game_over() {
            break;
        }
        let commands = bot.commands(&a);
        resolve_turn(&mut a, &commands);
        resolve_turn(&mut b, &commands);
        assert_eq!(
            Snapshot::capture(&a).to_json().unwrap(),
            Snapshot::capture(&b).to_json().unwrap(),
            "diverged at turn {}",
            a.turn
        );
    }
}

#[test]
fn test_restored_snapshot_continues_identically() {
    let config = GameConfig {
        width: 12,
        height: 12,
        seed: 31,
        ..GameConfig::default()
    };
    let mut original = generate_map(config).unwrap();
    let mut bot = RandomCommands::new(31);
    for _ in 0..20 {
        let commands = bot.commands(&original);
        resolve_turn(&mut original, &commands);
    }

    let json = Snapshot::capture(&original).to_json().unwrap();
    let mut restored = Snapshot::from_json(&json).unwrap().restore(config).unwrap();
    assert_eq!(Snapshot::capture(&restored).to_json().unwrap(), json);

    for _ in 0..30 {
        if original.is_game_over() {
            break;
        }
        let commands = bot.commands(&original);
        resolve_turn(&mut original, &commands);
        resolve_turn(&mut restored, &commands);
        assert_eq!(Snapshot::capture(&original), Snapshot::capture(&restored));
    }
}

#[test]
fn test_broadcast_of_generated_map() {
    let state = generate_map(GameConfig {
        width: 12,
        height: 12,
        seed: 2,
        ..GameConfig::default()
    })
    .unwrap();
    let text = encode_state(&state);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.first(), Some(&"rp 0 0"));
    assert_eq!(lines.last(), Some(&DONE_MARKER));
    assert!(lines.contains(&"u 0 0 u_1 3 6 0 0 0 0"));
    assert!(lines.contains(&"u 0 1 u_2 8 6 0 0 0 0"));
    assert!(lines.contains(&"ct 0 c_1 3 6 0"));
    assert!(lines.contains(&"ccd 8 6 6"));
}
