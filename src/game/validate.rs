//! Command parsing and legality checks.
//!
//! Each raw command line is turned into a typed [`Action`] or rejected with a
//! [`CommandError`]. Validation never mutates the game state; the only state
//! it carries between commands of one turn is [`AccumulatedActionStats`].

use std::collections::BTreeSet;

use crate::error::CommandError;
use crate::game::{
    Action, Actionable, Actor, Direction, GameState, MoveAction, Position, ResourceType, Team,
    Unit, UnitId,
};

/// Per-turn bookkeeping shared by all commands of a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatedActionStats {
    /// Actors that already received an action this turn.
    acted: BTreeSet<Actor>,
    /// Units queued for construction this turn, per team.
    queued_units: [usize; 2],
}

impl AccumulatedActionStats {
    /// Fresh stats for a new turn.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an actor already has an action this turn.
    #[must_use]
    pub fn has_acted(&self, actor: Actor) -> bool {
        self.acted.contains(&actor)
    }

    /// Units queued for construction by a team this turn.
    #[must_use]
    pub const fn queued_units(&self, team: Team) -> usize {
        self.queued_units[team.index()]
    }
}

fn malformed(command: &str, reason: &str) -> CommandError {
    CommandError::Malformed(format!("`{command}`: {reason}"))
}

fn parse_unit_id(command: &str, token: &str) -> Result<UnitId, CommandError> {
    token
        .parse()
        .map_err(|e: String| malformed(command, &e))
}

fn parse_coord(command: &str, token: &str) -> Result<u16, CommandError> {
    token
        .parse()
        .map_err(|_| malformed(command, "coordinates must be non-negative integers"))
}

fn expect_args<'a>(
    command: &str,
    tokens: &'a [&'a str],
    count: usize,
) -> Result<&'a [&'a str], CommandError> {
    if tokens.len() == count + 1 {
        Ok(&tokens[1..])
    } else {
        Err(malformed(
            command,
            &format!("expected {count} arguments, got {}", tokens.len().saturating_sub(1)),
        ))
    }
}

fn owned_unit(state: &GameState, team: Team, id: UnitId) -> Result<&Unit, CommandError> {
    state
        .registry
        .team(team)
        .units
        .get(&id)
        .ok_or(CommandError::UnitNotOwned { team, unit: id })
}

fn ready<A: Actionable>(actor: &A, name: Actor) -> Result<(), CommandError> {
    if actor.can_act() {
        Ok(())
    } else {
        Err(CommandError::OnCooldown {
            actor: name.to_string(),
            cooldown: actor.cooldown(),
        })
    }
}

fn ready_unit(state: &GameState, team: Team, id: UnitId) -> Result<&Unit, CommandError> {
    let unit = owned_unit(state, team, id)?;
    ready(unit, Actor::Unit(id))?;
    Ok(unit)
}

fn ready_worker(state: &GameState, team: Team, id: UnitId) -> Result<&Unit, CommandError> {
    let unit = ready_unit(state, team, id)?;
    if !unit.is_worker() {
        return Err(CommandError::NotAWorker(id));
    }
    if state.registry.is_city_tile(unit.pos) {
        return Err(CommandError::OnCityTile(id));
    }
    Ok(unit)
}

fn city_tile_action(
    state: &GameState,
    team: Team,
    command: &str,
    args: &[&str],
) -> Result<Position, CommandError> {
    let pos = Position::new(parse_coord(command, args[0])?, parse_coord(command, args[1])?);
    let tile = state
        .registry
        .city_tile(pos)
        .filter(|t| t.team == team)
        .ok_or(CommandError::NoCityTile { team, pos })?;
    ready(tile, Actor::CityTile(pos))?;
    Ok(pos)
}

fn check_unit_cap(
    state: &GameState,
    team: Team,
    stats: &AccumulatedActionStats,
) -> Result<(), CommandError> {
    let cap = state.city_tile_count(team);
    if state.unit_count(team) + stats.queued_units(team) >= cap {
        return Err(CommandError::UnitCapReached { team, cap });
    }
    Ok(())
}

fn parse_action(
    state: &GameState,
    team: Team,
    command: &str,
    stats: &AccumulatedActionStats,
) -> Result<Action, CommandError> {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    let Some(&verb) = tokens.first() else {
        return Err(malformed(command, "empty command"));
    };

    match verb {
        "m" => {
            let args = expect_args(command, &tokens, 2)?;
            let id = parse_unit_id(command, args[0])?;
            let direction = Direction::parse(args[1])
                .ok_or_else(|| malformed(command, "direction must be one of n, e, s, w, c"))?;
            let unit = ready_unit(state, team, id)?;
            let target = unit
                .pos
                .translate(direction, state.map.width(), state.map.height())
                .ok_or(CommandError::OutOfBounds { unit: id })?;
            if state
                .registry
                .city_tile(target)
                .is_some_and(|t| t.team != team)
            {
                return Err(CommandError::OpponentCityTile { unit: id, pos: target });
            }
            Ok(Action::Move(MoveAction {
                unit: id,
                team,
                direction,
                target,
            }))
        }
        "t" => {
            let args = expect_args(command, &tokens, 4)?;
            let src = parse_unit_id(command, args[0])?;
            let dst = parse_unit_id(command, args[1])?;
            let resource = ResourceType::parse(args[2])
                .ok_or_else(|| malformed(command, "resource must be wood, coal or uranium"))?;
            let amount: u32 = args[3]
                .parse()
                .map_err(|_| malformed(command, "amount must be a non-negative integer"))?;
            if src == dst {
                return Err(CommandError::SelfTransfer(src));
            }
            let source = ready_unit(state, team, src)?;
            let dest = owned_unit(state, team, dst)?;
            if !source.pos.is_adjacent_or_same(dest.pos) {
                return Err(CommandError::NotAdjacent { src, dst });
            }
            Ok(Action::Transfer {
                src,
                dst,
                resource,
                amount,
            })
        }
        "bw" | "bc" | "r" => {
            let args = expect_args(command, &tokens, 2)?;
            let pos = city_tile_action(state, team, command, args)?;
            match verb {
                "r" => Ok(Action::Research { pos }),
                "bw" => {
                    check_unit_cap(state, team, stats)?;
                    Ok(Action::BuildWorker { pos })
                }
                _ => {
                    check_unit_cap(state, team, stats)?;
                    Ok(Action::BuildCart { pos })
                }
            }
        }
        "bcity" => {
            let args = expect_args(command, &tokens, 1)?;
            let id = parse_unit_id(command, args[0])?;
            let unit = ready_worker(state, team, id)?;
            if state.map.get(unit.pos).is_some_and(|c| c.has_resource()) {
                return Err(CommandError::OnResource(id));
            }
            let cost = state.params().city_build_cost;
            if unit.cargo.total() < cost {
                return Err(CommandError::InsufficientCargo {
                    unit: id,
                    carried: unit.cargo.total(),
                    cost,
                });
            }
            Ok(Action::BuildCity { unit: id })
        }
        "p" => {
            let args = expect_args(command, &tokens, 1)?;
            let id = parse_unit_id(command, args[0])?;
            ready_worker(state, team, id)?;
            Ok(Action::Pillage { unit: id })
        }
        v if v.starts_with('d') => Ok(Action::Debug(command.to_string())),
        other => Err(CommandError::UnknownAction(other.to_string())),
    }
}

/// Parse and check one command from `team`.
///
/// On success the actor is recorded in `stats`, so a second command for the
/// same actor this turn is rejected.
///
/// # Errors
///
/// Returns a [`CommandError`] describing the first rule the command breaks.
pub fn validate_command(
    state: &GameState,
    team: Team,
    command: &str,
    stats: &mut AccumulatedActionStats,
) -> Result<Action, CommandError> {
    let action = parse_action(state, team, command, stats)?;
    if let Some(actor) = action.actor() {
        if stats.has_acted(actor) {
            return Err(CommandError::DuplicateAction(actor.to_string()));
        }
        stats.acted.insert(actor);
    }
    if matches!(action, Action::BuildWorker { .. } | Action::BuildCart { .. }) {
        stats.queued_units[team.index()] += 1;
    }
    Ok(action)
}
