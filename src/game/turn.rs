//! Turn resolution.
//!
//! [`resolve_turn`] is the single step function of the engine. It walks the
//! [`TurnPhase`] sequence, applying each phase to the whole state before the
//! next one starts:
//!
//! ```text
//! Validating -> Assigning -> ResolvingMovement -> ExecutingCityActions
//!   -> ExecutingUnitActions -> DistributingResources -> DepositingCargo
//!   -> NightResolution (night only) -> Cleanup -> AdvancingTurn
//! ```
//!
//! Errors raised by a single command or actor are recorded in the
//! [`TurnReport`] and logged against the issuing team; they never stop the
//! remaining actors.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{CommandError, ExecutionError};
use crate::game::{
    AccumulatedActionStats, Action, Actionable, Actor, Cargo, CityId, GameState, MatchStatus,
    MoveAction, Position, Snapshot, Team, UnitId, UnitType, distribute_all_resources,
    resolve_movement, validate_command,
};
use crate::protocol::Command;

/// Phases of a turn, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnPhase {
    /// Parse and check every command.
    Validating,
    /// Hand non-move actions to their actors.
    Assigning,
    /// Cancel colliding moves and hand out the rest.
    ResolvingMovement,
    /// Run city tile actions.
    ExecutingCityActions,
    /// Run unit actions and develop roads under carts.
    ExecutingUnitActions,
    /// Collect resources.
    DistributingResources,
    /// Turn cargo on city tiles into fuel.
    DepositingCargo,
    /// Pay light upkeep.
    NightResolution,
    /// Drop depleted resources, regrow wood, decay cooldowns.
    Cleanup,
    /// Advance the turn counter and check for the end of the match.
    AdvancingTurn,
}

impl TurnPhase {
    /// The phase after this one, or `None` after [`TurnPhase::AdvancingTurn`].
    #[must_use]
    pub const fn next(self, night: bool) -> Option<Self> {
        match self {
            Self::Validating => Some(Self::Assigning),
            Self::Assigning => Some(Self::ResolvingMovement),
            Self::ResolvingMovement => Some(Self::ExecutingCityActions),
            Self::ExecutingCityActions => Some(Self::ExecutingUnitActions),
            Self::ExecutingUnitActions => Some(Self::DistributingResources),
            Self::DistributingResources => Some(Self::DepositingCargo),
            Self::DepositingCargo if night => Some(Self::NightResolution),
            Self::DepositingCargo | Self::NightResolution => Some(Self::Cleanup),
            Self::Cleanup => Some(Self::AdvancingTurn),
            Self::AdvancingTurn => None,
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A command that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCommand {
    /// Issuing team.
    pub team: Team,
    /// Raw command text.
    pub command: String,
    /// Why it was rejected.
    pub error: CommandError,
}

/// An action that failed while executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorError {
    /// Team owning the actor.
    pub team: Team,
    /// What went wrong.
    pub error: ExecutionError,
}

/// Wall time spent in one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTiming {
    /// Phase measured.
    pub phase: TurnPhase,
    /// Time spent.
    pub elapsed: Duration,
}

/// Everything notable that happened during one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReport {
    /// Turn number that was resolved.
    pub turn: u32,
    /// Commands rejected by validation.
    pub rejected: Vec<RejectedCommand>,
    /// Actions that failed during execution.
    pub errors: Vec<ActorError>,
    /// Debug annotations kept this turn.
    pub annotations: Vec<(Team, String)>,
    /// Cities destroyed at night.
    pub destroyed_cities: Vec<CityId>,
    /// Units destroyed at night.
    pub destroyed_units: Vec<UnitId>,
    /// Per-phase timings, filled only when profiling is enabled.
    pub timings: Vec<PhaseTiming>,
}

/// Result of a single [`resolve_turn`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Whether the match continues.
    pub status: MatchStatus,
    /// What happened during the turn.
    pub report: TurnReport,
    /// State after the turn, when stateful replays are enabled.
    pub snapshot: Option<Snapshot>,
}

struct TurnContext<'a> {
    state: &'a mut GameState,
    commands: &'a [Command],
    night: bool,
    actions: Vec<(Team, Action)>,
    moves: Vec<MoveAction>,
    report: TurnReport,
    snapshot: Option<Snapshot>,
}

impl TurnContext<'_> {
    fn run(&mut self, phase: TurnPhase) {
        match phase {
            TurnPhase::Validating => self.validate(),
            TurnPhase::Assigning => self.assign(),
            TurnPhase::ResolvingMovement => self.resolve_moves(),
            TurnPhase::ExecutingCityActions => self.execute_city_actions(),
            TurnPhase::ExecutingUnitActions => self.execute_unit_actions(),
            TurnPhase::DistributingResources => self.distribute(),
            TurnPhase::DepositingCargo => self.deposit_cargo(),
            TurnPhase::NightResolution => self.resolve_night(),
            TurnPhase::Cleanup => self.cleanup(),
            TurnPhase::AdvancingTurn => self.advance(),
        }
    }

    fn record_error(&mut self, team: Team, error: ExecutionError) {
        warn!(turn = self.report.turn, %team, %error, "action failed");
        self.report.errors.push(ActorError { team, error });
    }

    fn validate(&mut self) {
        let mut stats = AccumulatedActionStats::new();
        let keep_debug = self.state.config.debug_annotations;
        for cmd in self.commands {
            let text = cmd.command.trim();
            if !keep_debug && text.starts_with('d') {
                continue;
            }
            match validate_command(self.state, cmd.team, text, &mut stats) {
                Ok(Action::Debug(note)) => self.report.annotations.push((cmd.team, note)),
                Ok(Action::Move(m)) => self.moves.push(m),
                Ok(action) => self.actions.push((cmd.team, action)),
                Err(error) => {
                    warn!(turn = self.report.turn, team = %cmd.team, command = text, %error, "rejected command");
                    self.report.rejected.push(RejectedCommand {
                        team: cmd.team,
                        command: text.to_string(),
                        error,
                    });
                }
            }
        }
        debug!(
            accepted = self.actions.len() + self.moves.len(),
            rejected = self.report.rejected.len(),
            "validated commands"
        );
    }

    fn give(&mut self, team: Team, action: Action) {
        let result = match action.actor() {
            Some(Actor::Unit(id)) => self
                .state
                .registry
                .unit_mut(id)
                .ok_or(ExecutionError::MissingUnit(id))
                .and_then(|u| u.give_action(action)),
            Some(Actor::CityTile(pos)) => self
                .state
                .registry
                .city_tiles
                .get_mut(&pos)
                .ok_or(ExecutionError::MissingCityTile(pos))
                .and_then(|t| t.give_action(action)),
            None => Ok(()),
        };
        if let Err(error) = result {
            self.record_error(team, error);
        }
    }

    fn assign(&mut self) {
        for (team, action) in std::mem::take(&mut self.actions) {
            self.give(team, action);
        }
    }

    fn resolve_moves(&mut self) {
        let resolved = resolve_movement(&self.state.registry, &self.moves);
        debug!(
            proposed = self.moves.len(),
            kept = resolved.len(),
            "resolved movement"
        );
        self.moves.clear();
        for m in resolved {
            self.give(m.team, Action::Move(m));
        }
    }

    fn execute_city_actions(&mut self) {
        let order: Vec<Position> = self
            .state
            .registry
            .cities
            .values()
            .flat_map(|c| c.cells.iter().copied())
            .collect();
        let cooldown = self.state.params().city_action_cooldown;

        for pos in order {
            let Some(tile) = self.state.registry.city_tiles.get_mut(&pos) else {
                continue;
            };
            let team = tile.team;
            let Some(action) = tile.take_action() else {
                continue;
            };
            match self.execute_city_action(team, pos, action) {
                Ok(()) => {
                    if let Some(tile) = self.state.registry.city_tiles.get_mut(&pos) {
                        tile.cooldown = cooldown;
                    }
                }
                Err(error) => self.record_error(team, error),
            }
        }
    }

    fn execute_city_action(
        &mut self,
        team: Team,
        pos: Position,
        action: Action,
    ) -> Result<(), ExecutionError> {
        match action {
            Action::BuildWorker { .. } => {
                self.state.spawn_unit(team, UnitType::Worker, pos)?;
            }
            Action::BuildCart { .. } => {
                self.state.spawn_unit(team, UnitType::Cart, pos)?;
            }
            Action::Research { .. } => {
                let requirements = self.state.params().research_requirements;
                let team_state = self.state.registry.team_mut(team);
                team_state.research_points += 1;
                if team_state.research_points >= requirements.coal {
                    team_state.researched.coal = true;
                }
                if team_state.research_points >= requirements.uranium {
                    team_state.researched.uranium = true;
                }
            }
            other => {
                return Err(ExecutionError::Precondition(format!(
                    "city tile at {pos} cannot perform {other:?}"
                )));
            }
        }
        Ok(())
    }

    fn execute_unit_actions(&mut self) {
        let params = *self.state.params();
        let multiplier = if self.night { 2.0 } else { 1.0 };

        for id in self.state.registry.unit_ids() {
            let Some(unit) = self.state.registry.unit_mut(id) else {
                continue;
            };
            let team = unit.team;
            let unit_type = unit.unit_type;
            let Some(action) = unit.take_action() else {
                continue;
            };
            match self.execute_unit_action(id, action) {
                Ok(()) => {
                    if let Some(unit) = self.state.registry.unit_mut(id) {
                        unit.cooldown += params.unit_action_cooldown.get(unit_type) * multiplier;
                    }
                }
                Err(error) => self.record_error(team, error),
            }
        }

        let carts: Vec<Position> = self
            .state
            .registry
            .units()
            .filter(|u| u.unit_type == UnitType::Cart)
            .map(|u| u.pos)
            .collect();
        for pos in carts {
            if let Some(cell) = self.state.map.get_mut(pos) {
                cell.road = (cell.road + params.cart_road_development_rate).min(params.max_road);
            }
        }
    }

    fn execute_unit_action(&mut self, id: UnitId, action: Action) -> Result<(), ExecutionError> {
        let params = *self.state.params();
        match action {
            Action::Move(m) => self.state.move_unit(id, m.target),
            Action::Transfer {
                src,
                dst,
                resource,
                amount,
            } => {
                let source = self
                    .state
                    .registry
                    .unit(src)
                    .ok_or(ExecutionError::MissingUnit(src))?;
                let dest = self
                    .state
                    .registry
                    .unit(dst)
                    .ok_or(ExecutionError::MissingUnit(dst))?;
                if source.team != dest.team || !source.pos.is_adjacent_or_same(dest.pos) {
                    return Err(ExecutionError::Precondition(format!(
                        "{dst} is no longer next to {src}"
                    )));
                }
                let moved = amount
                    .min(source.cargo.get(resource))
                    .min(dest.space_left(&params));
                if let Some(unit) = self.state.registry.unit_mut(src) {
                    *unit.cargo.get_mut(resource) -= moved;
                }
                if let Some(unit) = self.state.registry.unit_mut(dst) {
                    *unit.cargo.get_mut(resource) += moved;
                }
                Ok(())
            }
            Action::BuildCity { unit } => {
                let builder = self
                    .state
                    .registry
                    .unit(unit)
                    .ok_or(ExecutionError::MissingUnit(unit))?;
                let (team, pos) = (builder.team, builder.pos);
                if builder.cargo.total() < params.city_build_cost {
                    return Err(ExecutionError::Precondition(format!(
                        "{unit} no longer carries enough to build a city"
                    )));
                }
                if self.state.map.get(pos).is_some_and(|c| c.has_resource()) {
                    return Err(ExecutionError::Precondition(format!(
                        "cannot build a city on a resource at {pos}"
                    )));
                }
                let city = self.state.spawn_city_tile(team, pos)?;
                if let Some(builder) = self.state.registry.unit_mut(unit) {
                    builder.expend_for_city(params.city_build_cost);
                }
                debug!(%unit, %city, %pos, "built city tile");
                Ok(())
            }
            Action::Pillage { unit } => {
                let pos = self
                    .state
                    .registry
                    .unit(unit)
                    .ok_or(ExecutionError::MissingUnit(unit))?
                    .pos;
                let cell = self
                    .state
                    .map
                    .get_mut(pos)
                    .ok_or_else(|| ExecutionError::Precondition(format!("{pos} is off the map")))?;
                cell.road = (cell.road - params.pillage_rate).max(params.min_road);
                Ok(())
            }
            other => Err(ExecutionError::Precondition(format!(
                "{id} cannot perform {other:?}"
            ))),
        }
    }

    fn distribute(&mut self) {
        let params = *self.state.params();
        let grants =
            distribute_all_resources(&mut self.state.map, &mut self.state.registry, &params);
        debug!(grants = grants.len(), "distributed resources");
    }

    fn deposit_cargo(&mut self) {
        let params = *self.state.params();
        let registry = &self.state.registry;
        let deposits: Vec<(UnitId, CityId)> = registry
            .units()
            .filter(|u| u.cargo.total() > 0)
            .filter_map(|u| {
                registry
                    .city_tile(u.pos)
                    .filter(|t| t.team == u.team)
                    .map(|t| (u.id, t.city_id))
            })
            .collect();

        for (unit_id, city_id) in deposits {
            let Some(unit) = self.state.registry.unit_mut(unit_id) else {
                continue;
            };
            let fuel = unit.cargo.fuel_value(&params);
            unit.cargo = Cargo::default();
            if let Some(city) = self.state.registry.cities.get_mut(&city_id) {
                city.fuel += fuel;
            }
        }
    }

    fn resolve_night(&mut self) {
        let params = *self.state.params();
        let city_ids: Vec<CityId> = self.state.registry.cities.keys().copied().collect();
        for id in city_ids {
            let Some(city) = self.state.registry.cities.get(&id) else {
                continue;
            };
            let upkeep = city.light_upkeep(&params, self.state.registry.adjacency_sum(city));
            if city.fuel < upkeep {
                if let Some(city) = self.state.destroy_city(id) {
                    info!(turn = self.report.turn, team = %city.team, city = %id, tiles = city.cells.len(), "city ran out of fuel");
                    self.report.destroyed_cities.push(id);
                }
            } else if let Some(city) = self.state.registry.cities.get_mut(&id) {
                city.fuel -= upkeep;
            }
        }

        for id in self.state.registry.unit_ids() {
            let on_city = self
                .state
                .registry
                .unit(id)
                .is_some_and(|u| self.state.registry.is_city_tile(u.pos));
            if on_city {
                continue;
            }
            let survived = self
                .state
                .registry
                .unit_mut(id)
                .is_some_and(|u| u.spend_fuel_to_survive(&params));
            if !survived {
                if let Some(unit) = self.state.destroy_unit(id) {
                    info!(turn = self.report.turn, team = %unit.team, unit = %id, "unit froze");
                    self.report.destroyed_units.push(id);
                }
            }
        }
    }

    fn cleanup(&mut self) {
        let params = *self.state.params();
        let cleared = self.state.map.remove_depleted();
        if !cleared.is_empty() {
            debug!(count = cleared.len(), "resources depleted");
        }
        self.state
            .map
            .regrow_wood(params.wood_growth_rate, params.max_wood_amount);

        let map = &self.state.map;
        for team in &mut self.state.registry.teams {
            for unit in team.units.values_mut() {
                let road = map.get(unit.pos).map_or(0.0, |c| c.road);
                unit.cooldown = (unit.cooldown - (1.0 + road)).max(0.0);
            }
        }
        for tile in self.state.registry.city_tiles.values_mut() {
            tile.cooldown = (tile.cooldown - 1.0).max(0.0);
        }
    }

    fn advance(&mut self) {
        self.state.turn += 1;
        if self.state.config.stateful_replay {
            self.snapshot = Some(Snapshot::capture(self.state));
        }
    }
}

/// Resolve one turn with the commands of both teams.
///
/// Commands are validated in the order given; the outcome does not depend on
/// how commands of different actors are interleaved.
pub fn resolve_turn(state: &mut GameState, commands: &[Command]) -> TurnOutcome {
    let turn = state.turn;
    let night = state.is_night();
    let profile = state.config.run_profiler;
    let mut ctx = TurnContext {
        state,
        commands,
        night,
        actions: Vec::new(),
        moves: Vec::new(),
        report: TurnReport {
            turn,
            ..TurnReport::default()
        },
        snapshot: None,
    };

    let mut phase = Some(TurnPhase::Validating);
    while let Some(current) = phase {
        let started = profile.then(Instant::now);
        ctx.run(current);
        if let Some(started) = started {
            ctx.report.timings.push(PhaseTiming {
                phase: current,
                elapsed: started.elapsed(),
            });
        }
        phase = current.next(night);
    }

    let status = ctx.state.status();
    if let MatchStatus::Finished { winner } = status {
        info!(turn = ctx.state.turn, ?winner, "match finished");
    }
    TurnOutcome {
        status,
        report: ctx.report,
        snapshot: ctx.snapshot,
    }
}
