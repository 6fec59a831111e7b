#![no_main]

//! Resource distribution fuzzer.
//!
//! Scatters deposits and workers over a small map and checks that one
//! distribution pass conserves every resource and respects capacity.

use arbitrary::Arbitrary;
use duskfall::config::GameConfig;
use duskfall::game::{
    GameState, Position, ResourceType, Team, UnitType, distribute_all_resources, water_fill,
};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct DistributionInput {
    /// (x, y, kind, amount) per deposit.
    deposits: Vec<(u8, u8, u8, u16)>,
    /// (x, y, team, preloaded wood) per worker.
    workers: Vec<(u8, u8, bool, u8)>,
    /// Research unlocked for both teams.
    coal: bool,
    uranium: bool,
    /// Direct water-filling input.
    available: u16,
    asks: Vec<u16>,
}

fn totals(state: &GameState) -> [u64; 3] {
    ResourceType::ALL.map(|r| {
        state.map.total_resource(r)
            + state
                .registry
                .units()
                .map(|u| u64::from(u.cargo.get(r)))
                .sum::<u64>()
    })
}

fuzz_target!(|input: DistributionInput| {
    let mut asks: Vec<u32> = input.asks.iter().take(64).map(|&a| u32::from(a)).collect();
    asks.sort_unstable();
    let grants = water_fill(u32::from(input.available), &asks);
    assert_eq!(grants.len(), asks.len());
    assert!(grants.iter().map(|&g| u64::from(g)).sum::<u64>() <= u64::from(input.available));

    let config = GameConfig {
        width: 8,
        height: 8,
        ..GameConfig::default()
    };
    let Ok(mut state) = GameState::new(config) else {
        return;
    };
    for &(x, y, kind, amount) in input.deposits.iter().take(32) {
        let resource = ResourceType::ALL[usize::from(kind % 3)];
        let pos = Position::new(u16::from(x % 8), u16::from(y % 8));
        state.map.add_resource(pos, resource, u32::from(amount));
    }
    for &(x, y, team_b, wood) in input.workers.iter().take(32) {
        let team = if team_b { Team::B } else { Team::A };
        let pos = Position::new(u16::from(x % 8), u16::from(y % 8));
        if let Ok(id) = state.spawn_unit(team, UnitType::Worker, pos) {
            if let Some(unit) = state.registry.unit_mut(id) {
                unit.cargo.wood = u32::from(wood % 100);
            }
        }
    }
    for team in Team::ALL {
        let researched = &mut state.registry.team_mut(team).researched;
        researched.coal = input.coal;
        researched.uranium = input.uranium;
    }

    let before = totals(&state);
    let params = *state.params();
    distribute_all_resources(&mut state.map, &mut state.registry, &params);
    assert_eq!(totals(&state), before, "distribution changed resource totals");
    for unit in state.registry.units() {
        assert!(unit.cargo.total() <= unit.capacity(&params));
    }
});
