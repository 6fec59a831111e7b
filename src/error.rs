//! Error types for the simulation engine.
//!
//! Command and execution errors are recoverable: the turn executor logs them
//! against the issuing team and carries on. Snapshot, config, replay and
//! match errors are fatal for the operation that produced them.

use thiserror::Error;

use crate::game::{CityId, Position, Team, UnitId};

/// Why a command was rejected during validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// The command text could not be parsed.
    #[error("malformed command: {0}")]
    Malformed(String),
    /// The verb is not a known action.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    /// No unit with this id belongs to the issuing team.
    #[error("team {team} does not own unit {unit}")]
    UnitNotOwned {
        /// Issuing team.
        team: Team,
        /// Referenced unit.
        unit: UnitId,
    },
    /// There is no city tile of the issuing team at the position.
    #[error("team {team} has no city tile at {pos}")]
    NoCityTile {
        /// Issuing team.
        team: Team,
        /// Referenced position.
        pos: Position,
    },
    /// The actor's cooldown has not dropped below 1 yet.
    #[error("{actor} is on cooldown ({cooldown})")]
    OnCooldown {
        /// Actor description.
        actor: String,
        /// Current cooldown.
        cooldown: f64,
    },
    /// The actor already has an action this turn.
    #[error("{0} already has an action this turn")]
    DuplicateAction(String),
    /// The target cell is outside the map.
    #[error("{unit} cannot move off the map")]
    OutOfBounds {
        /// Moving unit.
        unit: UnitId,
    },
    /// Units may not enter an opponent's city tile.
    #[error("{unit} cannot move onto an opponent city tile at {pos}")]
    OpponentCityTile {
        /// Moving unit.
        unit: UnitId,
        /// Target cell.
        pos: Position,
    },
    /// The team already has as many units as it has city tiles.
    #[error("team {team} reached its unit cap of {cap}")]
    UnitCapReached {
        /// Issuing team.
        team: Team,
        /// Number of city tiles owned.
        cap: usize,
    },
    /// The action is only available to workers.
    #[error("{0} is not a worker")]
    NotAWorker(UnitId),
    /// The unit stands on a city tile.
    #[error("{0} is standing on a city tile")]
    OnCityTile(UnitId),
    /// The unit stands on a resource cell.
    #[error("{0} is standing on a resource")]
    OnResource(UnitId),
    /// The worker does not carry enough to found a city.
    #[error("{unit} carries {carried} but a city costs {cost}")]
    InsufficientCargo {
        /// Building unit.
        unit: UnitId,
        /// Cargo carried.
        carried: u32,
        /// Required amount.
        cost: u32,
    },
    /// Transfer source and destination are the same unit.
    #[error("{0} cannot transfer to itself")]
    SelfTransfer(UnitId),
    /// Transfer destination is not on the same or an adjacent cell.
    #[error("{src} and {dst} are not adjacent")]
    NotAdjacent {
        /// Source unit.
        src: UnitId,
        /// Destination unit.
        dst: UnitId,
    },
}

/// A failure while applying an already validated action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The acting unit disappeared before it could act.
    #[error("unit {0} no longer exists")]
    MissingUnit(UnitId),
    /// The city tile disappeared before it could act.
    #[error("no city tile at {0}")]
    MissingCityTile(Position),
    /// The city record referenced by a tile is gone.
    #[error("city {0} no longer exists")]
    MissingCity(CityId),
    /// A precondition no longer holds at execution time.
    #[error("{0}")]
    Precondition(String),
    /// The actor already holds an action for this turn.
    #[error("actor already has an action this turn")]
    ActionAlreadyAssigned,
}

/// A snapshot that cannot be restored.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot JSON is malformed.
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The map has no rows or columns, or is too large.
    #[error("map dimensions {width}x{height} are not usable")]
    BadDimensions {
        /// Row length.
        width: usize,
        /// Row count.
        height: usize,
    },
    /// Rows have different lengths.
    #[error("map row {row} has {len} cells, expected {expected}")]
    RaggedRow {
        /// Row index.
        row: usize,
        /// Row length.
        len: usize,
        /// Expected length.
        expected: usize,
    },
    /// An entity lies outside the map.
    #[error("{what} at ({x}, {y}) is outside the map")]
    OutOfBounds {
        /// Entity description.
        what: String,
        /// X coordinate.
        x: i64,
        /// Y coordinate.
        y: i64,
    },
    /// A value violates a structural invariant.
    #[error("invalid value: {0}")]
    Invariant(String),
    /// The configuration the snapshot is restored under is unusable.
    #[error("snapshot config is invalid: {0}")]
    Config(#[from] ConfigError),
}

/// A configuration that cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config JSON is malformed.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors from saving, loading or verifying a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The replay file could not be read or written.
    #[error("cannot access replay {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The replay JSON is malformed.
    #[error("invalid replay JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The recorded config is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The recorded initial snapshot cannot be restored.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// The initial state could not be generated.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// Stateful snapshots do not line up with the recorded turns.
    #[error("replay has {commands} turns of commands but {snapshots} snapshots")]
    LengthMismatch {
        /// Recorded turns of commands.
        commands: usize,
        /// Recorded snapshots.
        snapshots: usize,
    },
    /// Re-running the commands produced a different state.
    #[error("replay diverges after turn {turn}")]
    Diverged {
        /// First turn whose resulting state differs.
        turn: u32,
    },
}

/// Errors that abort a match.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The match config is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The starting snapshot cannot be restored.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Starting units or cities could not be placed.
    #[error("cannot set up match: {0}")]
    Setup(#[from] ExecutionError),
    /// A turn left the state inconsistent.
    #[error("invariants broken after turn {turn}: {message}")]
    Invariant {
        /// Turn that was just resolved.
        turn: u32,
        /// Joined violation messages.
        message: String,
    },
}
