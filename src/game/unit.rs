//! Mobile units and their cargo.

use serde::{Deserialize, Serialize};

use crate::config::Parameters;
use crate::error::ExecutionError;
use crate::game::{Action, Actionable, Position, ResourceType, Team, UnitId};

/// Kind of unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UnitType {
    /// Collects resources and founds cities.
    Worker,
    /// Hauls large cargo and builds roads.
    Cart,
}

impl UnitType {
    /// Protocol number of this unit type.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Worker => 0,
            Self::Cart => 1,
        }
    }
}

impl From<UnitType> for u8 {
    fn from(unit_type: UnitType) -> Self {
        unit_type.as_u8()
    }
}

impl TryFrom<u8> for UnitType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Worker),
            1 => Ok(Self::Cart),
            other => Err(format!("unknown unit type {other}")),
        }
    }
}

/// Resources carried by a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cargo {
    /// Wood carried.
    pub wood: u32,
    /// Coal carried.
    pub coal: u32,
    /// Uranium carried.
    pub uranium: u32,
}

impl Cargo {
    /// Amount of one resource.
    #[must_use]
    pub const fn get(&self, resource: ResourceType) -> u32 {
        match resource {
            ResourceType::Wood => self.wood,
            ResourceType::Coal => self.coal,
            ResourceType::Uranium => self.uranium,
        }
    }

    /// Mutable amount of one resource.
    pub const fn get_mut(&mut self, resource: ResourceType) -> &mut u32 {
        match resource {
            ResourceType::Wood => &mut self.wood,
            ResourceType::Coal => &mut self.coal,
            ResourceType::Uranium => &mut self.uranium,
        }
    }

    /// Sum of all resources, saturating at `u32::MAX`.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.wood.saturating_add(self.coal).saturating_add(self.uranium)
    }

    /// Fuel value of the whole cargo.
    #[must_use]
    pub fn fuel_value(&self, params: &Parameters) -> f64 {
        ResourceType::ALL
            .iter()
            .map(|&r| f64::from(self.get(r)) * params.resource_to_fuel_rate.get(r))
            .sum()
    }
}

/// A unit on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Unique id.
    pub id: UnitId,
    /// Owning team.
    pub team: Team,
    /// Worker or cart.
    pub unit_type: UnitType,
    /// Current cell.
    pub pos: Position,
    /// Carried resources.
    pub cargo: Cargo,
    /// Turns (scaled by road) until the unit may act again.
    pub cooldown: f64,
    /// Action assigned for the current turn.
    pending: Option<Action>,
}

impl Unit {
    /// Create a unit with empty cargo and no cooldown.
    #[must_use]
    pub const fn new(id: UnitId, team: Team, unit_type: UnitType, pos: Position) -> Self {
        Self {
            id,
            team,
            unit_type,
            pos,
            cargo: Cargo {
                wood: 0,
                coal: 0,
                uranium: 0,
            },
            cooldown: 0.0,
            pending: None,
        }
    }

    /// Whether this unit is a worker.
    #[must_use]
    pub fn is_worker(&self) -> bool {
        self.unit_type == UnitType::Worker
    }

    /// Cargo capacity for this unit's type.
    #[must_use]
    pub const fn capacity(&self, params: &Parameters) -> u32 {
        params.resource_capacity.get(self.unit_type)
    }

    /// Remaining cargo space.
    #[must_use]
    pub const fn space_left(&self, params: &Parameters) -> u32 {
        self.capacity(params).saturating_sub(self.cargo.total())
    }

    /// Burn cargo to cover one night of light upkeep.
    ///
    /// Resources are consumed wood first, then coal, then uranium, always in
    /// whole units. Returns `false` if the cargo could not cover the upkeep,
    /// in which case everything was burned.
    pub fn spend_fuel_to_survive(&mut self, params: &Parameters) -> bool {
        let mut fuel_needed = params.light_upkeep.unit(self.unit_type);
        for resource in ResourceType::ALL {
            if fuel_needed <= 0.0 {
                break;
            }
            let rate = params.resource_to_fuel_rate.get(resource);
            let held = self.cargo.get_mut(resource);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let required = (fuel_needed / rate).ceil() as u32;
            if *held >= required {
                *held -= required;
                fuel_needed = 0.0;
            } else {
                fuel_needed -= f64::from(*held) * rate;
                *held = 0;
            }
        }
        fuel_needed <= 0.0
    }

    /// Spend `cost` resources, wood first, then coal, then uranium.
    ///
    /// The caller checks that the cargo total covers the cost.
    pub fn expend_for_city(&mut self, cost: u32) {
        let mut remaining = cost;
        for resource in ResourceType::ALL {
            let held = self.cargo.get_mut(resource);
            let spent = (*held).min(remaining);
            *held -= spent;
            remaining -= spent;
        }
    }
}

impl Actionable for Unit {
    fn cooldown(&self) -> f64 {
        self.cooldown
    }

    fn give_action(&mut self, action: Action) -> Result<(), ExecutionError> {
        if self.pending.is_some() {
            return Err(ExecutionError::ActionAlreadyAssigned);
        }
        self.pending = Some(action);
        Ok(())
    }

    fn take_action(&mut self) -> Option<Action> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> Unit {
        Unit::new(UnitId(1), Team::A, UnitType::Worker, Position::new(0, 0))
    }

    #[test]
    fn test_cargo_total_saturates() {
        let cargo = Cargo {
            wood: u32::MAX,
            coal: 1,
            uranium: 7,
        };
        assert_eq!(cargo.total(), u32::MAX);
    }

    #[test]
    fn test_survive_on_wood() {
        let params = Parameters::default();
        let mut unit = worker();
        unit.cargo.wood = 10;
        assert!(unit.spend_fuel_to_survive(&params));
        assert_eq!(unit.cargo.wood, 6);
    }

    #[test]
    fn test_survive_falls_through_to_coal() {
        let params = Parameters::default();
        let mut unit = worker();
        unit.cargo.wood = 1;
        unit.cargo.coal = 3;
        assert!(unit.spend_fuel_to_survive(&params));
        // 1 wood covers 1 fuel, remaining 3 fuel needs ceil(3/10) = 1 coal
        assert_eq!(unit.cargo, Cargo { wood: 0, coal: 2, uranium: 0 });
    }

    #[test]
    fn test_starves_without_cargo() {
        let params = Parameters::default();
        let mut unit = worker();
        unit.cargo.wood = 3;
        assert!(!unit.spend_fuel_to_survive(&params));
        assert_eq!(unit.cargo.total(), 0);
    }

    #[test]
    fn test_expend_for_city_order() {
        let mut unit = worker();
        unit.cargo = Cargo { wood: 60, coal: 30, uranium: 20 };
        unit.expend_for_city(100);
        assert_eq!(unit.cargo, Cargo { wood: 0, coal: 0, uranium: 10 });
    }

    #[test]
    fn test_space_left() {
        let params = Parameters::default();
        let mut unit = worker();
        unit.cargo.coal = 30;
        assert_eq!(unit.space_left(&params), 70);
        let cart = Unit::new(UnitId(2), Team::B, UnitType::Cart, Position::new(0, 0));
        assert_eq!(cart.space_left(&params), 2000);
    }

    #[test]
    fn test_single_pending_action() {
        let mut unit = worker();
        assert!(unit.can_act());
        unit.give_action(Action::Pillage { unit: unit.id }).unwrap();
        assert_eq!(
            unit.give_action(Action::Pillage { unit: unit.id }),
            Err(ExecutionError::ActionAlreadyAssigned)
        );
        assert!(unit.take_action().is_some());
        assert!(unit.take_action().is_none());
    }

    #[test]
    fn test_unit_type_serde_numbers() {
        assert_eq!(serde_json::to_string(&UnitType::Cart).unwrap(), "1");
        assert_eq!(serde_json::from_str::<UnitType>("0").unwrap(), UnitType::Worker);
        assert!(serde_json::from_str::<UnitType>("2").is_err());
    }
}
