//! Deterministic map generation for matches.
//!
//! Maps are mirrored across the vertical centre line so both teams start
//! with the same surroundings. All randomness comes from the state's own
//! seeded stream, so a config always produces the same map.

use rand::Rng;

use crate::config::GameConfig;
use crate::error::{ConfigError, MatchError};
use crate::game::{GameState, Position, ResourceType, Team, UnitType};

/// Narrowest map that leaves room for two mirrored starts.
pub const MIN_MAP_WIDTH: u16 = 4;

/// Chance, in percent, that a free cell receives wood.
const WOOD_CHANCE: u32 = 12;
/// Chance, in percent, that a free cell far enough from a start receives coal.
const COAL_CHANCE: u32 = 4;
/// Chance, in percent, that a free cell far enough from a start receives uranium.
const URANIUM_CHANCE: u32 = 2;

/// Cells within this distance of a start stay empty.
const CLEAR_RADIUS: u32 = 1;
const COAL_MIN_DISTANCE: u32 = 4;
const URANIUM_MIN_DISTANCE: u32 = 6;

/// Starting city tile (and worker) of a team.
#[must_use]
pub fn start_position(team: Team, width: u16, height: u16) -> Position {
    let left = Position::new(width / 4, height / 2);
    match team {
        Team::A => left,
        Team::B => mirror(left, width),
    }
}

const fn mirror(pos: Position, width: u16) -> Position {
    Position::new(width - 1 - pos.x, pos.y)
}

/// Pick the resource for a left-half cell at `distance` from team A's start.
fn roll_resource<R: Rng>(rng: &mut R, distance: u32, max_wood: u32) -> Option<(ResourceType, u32)> {
    let roll = rng.gen_range(0..100u32);
    if roll < URANIUM_CHANCE && distance >= URANIUM_MIN_DISTANCE {
        return Some((ResourceType::Uranium, rng.gen_range(300..=350)));
    }
    if roll < URANIUM_CHANCE + COAL_CHANCE && distance >= COAL_MIN_DISTANCE {
        return Some((ResourceType::Coal, rng.gen_range(350..=425)));
    }
    if roll < URANIUM_CHANCE + COAL_CHANCE + WOOD_CHANCE {
        let low = max_wood.min(150);
        return Some((ResourceType::Wood, rng.gen_range(low..=max_wood.max(low))));
    }
    None
}

/// Generate the starting state for a match.
///
/// Each team gets one city tile with a worker on it. Resources are rolled
/// for the left half and mirrored onto the right half; on odd widths the
/// centre column stays empty.
///
/// # Errors
///
/// Returns an error if the config is invalid or the map is narrower than
/// [`MIN_MAP_WIDTH`].
pub fn generate_map(config: GameConfig) -> Result<GameState, MatchError> {
    if config.width < MIN_MAP_WIDTH {
        return Err(ConfigError::Invalid(format!(
            "map width {} is below the minimum of {MIN_MAP_WIDTH}",
            config.width
        ))
        .into());
    }

    let mut state = GameState::new(config)?;
    let (width, height) = (state.map.width(), state.map.height());
    let max_wood = state.params().max_wood_amount;
    let start = start_position(Team::A, width, height);

    let mut placements = Vec::new();
    for y in 0..height {
        for x in 0..width / 2 {
            let pos = Position::new(x, y);
            let distance = pos.distance_to(start);
            if distance <= CLEAR_RADIUS {
                continue;
            }
            if let Some((resource, amount)) = roll_resource(state.rng_mut(), distance, max_wood) {
                placements.push((pos, resource, amount));
            }
        }
    }

    for (pos, resource, amount) in placements {
        state.map.add_resource(pos, resource, amount);
        state.map.add_resource(mirror(pos, width), resource, amount);
    }

    for team in Team::ALL {
        state.spawn_city_tile(team, start_position(team, width, height))?;
    }
    for team in Team::ALL {
        state.spawn_unit(team, UnitType::Worker, start_position(team, width, height))?;
    }

    Ok(state)
}
