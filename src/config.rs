//! Match configuration.
//!
//! A [`GameConfig`] carries the map size, seed, feature toggles and the full
//! table of game [`Parameters`]. Every field has a default, so a JSON config
//! file only needs to mention the values it overrides:
//!
//! ```json
//! { "width": 16, "height": 16, "parameters": { "MAX_DAYS": 40 } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::game::{ResourceType, UnitType};

/// Per-resource amounts (collection rates, fuel rates).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PerResource<T> {
    /// Value for wood.
    pub wood: T,
    /// Value for coal.
    pub coal: T,
    /// Value for uranium.
    pub uranium: T,
}

impl<T: Copy> PerResource<T> {
    /// Look up the value for a resource type.
    #[must_use]
    pub const fn get(&self, resource: ResourceType) -> T {
        match resource {
            ResourceType::Wood => self.wood,
            ResourceType::Coal => self.coal,
            ResourceType::Uranium => self.uranium,
        }
    }
}

/// Per-unit-type amounts (capacity, cooldown, upkeep).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PerUnit<T> {
    /// Value for workers.
    pub worker: T,
    /// Value for carts.
    pub cart: T,
}

impl<T: Copy> PerUnit<T> {
    /// Look up the value for a unit type.
    #[must_use]
    pub const fn get(&self, unit_type: UnitType) -> T {
        match unit_type {
            UnitType::Worker => self.worker,
            UnitType::Cart => self.cart,
        }
    }
}

/// Light upkeep per night turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LightUpkeep {
    /// Upkeep per city tile.
    pub city: f64,
    /// Upkeep per worker outside a city.
    pub worker: f64,
    /// Upkeep per cart outside a city.
    pub cart: f64,
}

impl LightUpkeep {
    /// Upkeep owed by a unit of the given type.
    #[must_use]
    pub const fn unit(&self, unit_type: UnitType) -> f64 {
        match unit_type {
            UnitType::Worker => self.worker,
            UnitType::Cart => self.cart,
        }
    }
}

/// Research point thresholds unlocking collection of advanced resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ResearchRequirements {
    /// Points needed to collect coal.
    pub coal: u32,
    /// Points needed to collect uranium.
    pub uranium: u32,
}

/// Game rule constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Parameters {
    /// Number of day turns per cycle.
    pub day_length: u32,
    /// Number of night turns per cycle.
    pub night_length: u32,
    /// Turn count at which the match ends.
    pub max_days: u32,
    /// Fuel burned per night turn.
    pub light_upkeep: LightUpkeep,
    /// Multiplicative regrowth of wood cells per turn.
    pub wood_growth_rate: f64,
    /// Regrowth cap for a wood cell.
    pub max_wood_amount: u32,
    /// Cargo spent by a worker to found a city tile.
    pub city_build_cost: u32,
    /// Upkeep discount per same-team neighbor of each city tile.
    pub city_adjacency_bonus: f64,
    /// Cargo capacity per unit type.
    pub resource_capacity: PerUnit<u32>,
    /// Amount a worker collects per turn from each eligible cell.
    pub worker_collection_rate: PerResource<u32>,
    /// Fuel obtained per unit of each resource.
    pub resource_to_fuel_rate: PerResource<f64>,
    /// Research thresholds.
    pub research_requirements: ResearchRequirements,
    /// Cooldown applied to a city tile after it acts.
    pub city_action_cooldown: f64,
    /// Cooldown added to a unit after it acts.
    pub unit_action_cooldown: PerUnit<f64>,
    /// Highest road level.
    pub max_road: f64,
    /// Lowest road level.
    pub min_road: f64,
    /// Road gained by a cell each turn a cart ends there.
    pub cart_road_development_rate: f64,
    /// Road removed by a pillage action.
    pub pillage_rate: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            day_length: 30,
            night_length: 10,
            max_days: 360,
            light_upkeep: LightUpkeep {
                city: 23.0,
                worker: 4.0,
                cart: 10.0,
            },
            wood_growth_rate: 1.025,
            max_wood_amount: 500,
            city_build_cost: 100,
            city_adjacency_bonus: 5.0,
            resource_capacity: PerUnit {
                worker: 100,
                cart: 2000,
            },
            worker_collection_rate: PerResource {
                wood: 20,
                coal: 5,
                uranium: 2,
            },
            resource_to_fuel_rate: PerResource {
                wood: 1.0,
                coal: 10.0,
                uranium: 40.0,
            },
            research_requirements: ResearchRequirements {
                coal: 50,
                uranium: 200,
            },
            city_action_cooldown: 10.0,
            unit_action_cooldown: PerUnit {
                worker: 2.0,
                cart: 3.0,
            },
            max_road: 6.0,
            min_road: 0.0,
            cart_road_development_rate: 0.75,
            pillage_rate: 0.5,
        }
    }
}

/// Configuration for a single match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Map width in cells.
    pub width: u16,
    /// Map height in cells.
    pub height: u16,
    /// Seed for map generation.
    pub seed: u64,
    /// Keep `d...` debug annotation commands instead of filtering them.
    pub debug_annotations: bool,
    /// Attach a full snapshot to every turn outcome.
    pub stateful_replay: bool,
    /// Record per-phase timings in turn reports.
    pub run_profiler: bool,
    /// Game rule constants.
    pub parameters: Parameters,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 16,
            height: 16,
            seed: 0,
            debug_annotations: false,
            stateful_replay: false,
            run_profiler: false,
            parameters: Parameters::default(),
        }
    }
}

impl GameConfig {
    /// Parse a config from JSON text and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values are unusable.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Check that the configuration describes a playable match.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.parameters;
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "map must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if p.day_length == 0 {
            return Err(ConfigError::Invalid("DAY_LENGTH must be positive".into()));
        }
        if p.min_road > p.max_road || p.min_road < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "road bounds [{}, {}] are not a valid range",
                p.min_road, p.max_road
            )));
        }
        if p.resource_capacity.worker == 0 || p.resource_capacity.cart == 0 {
            return Err(ConfigError::Invalid("RESOURCE_CAPACITY must be positive".into()));
        }
        let rates = p.resource_to_fuel_rate;
        if rates.wood <= 0.0 || rates.coal <= 0.0 || rates.uranium <= 0.0 {
            return Err(ConfigError::Invalid(
                "RESOURCE_TO_FUEL_RATE must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Whether the given turn falls in the night part of the cycle.
    #[must_use]
    pub const fn is_night(&self, turn: u32) -> bool {
        let p = &self.parameters;
        let cycle = p.day_length + p.night_length;
        turn % cycle >= p.day_length
    }
}
