//! Text protocol spoken with bot processes.
//!
//! Bots receive the state as one line per entity, terminated by `D_DONE`,
//! and answer with a single line of comma-separated commands:
//!
//! ```text
//! m u_1 n,bw 3 4,r 3 5
//! ```

use serde::{Deserialize, Serialize};

use crate::game::{GameState, Team};

/// Marker ending every state broadcast.
pub const DONE_MARKER: &str = "D_DONE";

/// One raw command from a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Issuing team.
    #[serde(rename = "agentID")]
    pub team: Team,
    /// Command text, e.g. `m u_1 n`.
    pub command: String,
}

impl Command {
    /// Create a command.
    #[must_use]
    pub fn new(team: Team, command: impl Into<String>) -> Self {
        Self {
            team,
            command: command.into(),
        }
    }

    /// Split a bot's response line into commands, skipping empty entries.
    #[must_use]
    pub fn parse_line(team: Team, line: &str) -> Vec<Self> {
        line.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| Self::new(team, c))
            .collect()
    }
}

/// Lines sent once to a bot before the first turn: its team and the map size.
#[must_use]
pub fn encode_preamble(team: Team, state: &GameState) -> Vec<String> {
    vec![
        team.to_string(),
        format!("{} {}", state.map.width(), state.map.height()),
    ]
}

/// Encode the per-turn state broadcast.
///
/// Every line is terminated by `\n`, including the final [`DONE_MARKER`].
#[must_use]
pub fn encode_state(state: &GameState) -> String {
    let mut out = String::new();
    let registry = &state.registry;
    let params = state.params();

    for team in Team::ALL {
        out.push_str(&format!("rp {team} {}\n", registry.team(team).research_points));
    }

    for &pos in state.map.resource_positions() {
        if let Some(r) = state.map.get(pos).and_then(|c| c.resource) {
            out.push_str(&format!("r {} {} {} {}\n", r.resource_type, pos.x, pos.y, r.amount));
        }
    }

    for unit in registry.units() {
        out.push_str(&format!(
            "u {} {} {} {} {} {} {} {} {}\n",
            unit.unit_type.as_u8(),
            unit.team,
            unit.id,
            unit.pos.x,
            unit.pos.y,
            unit.cooldown,
            unit.cargo.wood,
            unit.cargo.coal,
            unit.cargo.uranium
        ));
    }

    for city in registry.cities.values() {
        let upkeep = city.light_upkeep(params, registry.adjacency_sum(city));
        out.push_str(&format!("c {} {} {} {}\n", city.team, city.id, city.fuel, upkeep));
        for &pos in &city.cells {
            if let Some(tile) = registry.city_tile(pos) {
                out.push_str(&format!(
                    "ct {} {} {} {} {}\n",
                    tile.team, city.id, pos.x, pos.y, tile.cooldown
                ));
            }
        }
    }

    for cell in state.map.iter() {
        if cell.road > 0.0 {
            out.push_str(&format!("ccd {} {} {}\n", cell.pos.x, cell.pos.y, cell.road));
        }
    }

    out.push_str(DONE_MARKER);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::{Position, ResourceType, UnitType};

    #[test]
    fn test_command_json_uses_agent_id() {
        let cmd = Command::new(Team::B, "m u_1 n");
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"agentID":1,"command":"m u_1 n"}"#);
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_parse_line() {
        let cmds = Command::parse_line(Team::A, "m u_1 n, bw 3 4,,r 3 5 ");
        let texts: Vec<&str> = cmds.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(texts, ["m u_1 n", "bw 3 4", "r 3 5"]);
        assert!(Command::parse_line(Team::A, "").is_empty());
    }

    #[test]
    fn test_encode_state() {
        let config = GameConfig {
            width: 4,
            height: 4,
            ..GameConfig::default()
        };
        let mut state = GameState::new(config).unwrap();
        state.map.add_resource(Position::new(3, 0), ResourceType::Uranium, 300);
        state.spawn_city_tile(Team::A, Position::new(1, 1)).unwrap();
        let id = state
            .spawn_unit(Team::A, UnitType::Worker, Position::new(1, 2))
            .unwrap();
        state.registry.unit_mut(id).unwrap().cargo.wood = 7;
        state.map.get_mut(Position::new(1, 2)).unwrap().road = 0.75;

        let text = encode_state(&state);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "rp 0 0",
                "rp 1 0",
                "r uranium 3 0 300",
                "u 0 0 u_1 1 2 0 7 0 0",
                "c 0 c_1 0 23",
                "ct 0 c_1 1 1 0",
                "ccd 1 1 6",
                "ccd 1 2 0.75",
                "D_DONE",
            ]
        );
        assert_eq!(text.matches('\n').count(), lines.len());
        assert!(text.ends_with("D_DONE\n"));
        assert_eq!(encode_preamble(Team::B, &state), ["1", "4 4"]);
    }
}
