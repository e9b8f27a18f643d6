//! Sports tools the model can call, backed by the balldontlie NBA API.
//!
//! Argument problems (blank names, out of range seasons, malformed dates) are
//! answered with an `{"error": ...}` payload so the model can explain them to
//! the user. Only transport failures surface as `Err`.

use crate::adapters::balldontlie::BalldontlieClient;
use crate::domain::ports::Tool;
use crate::tools::ToolRegistry;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};
use std::sync::Arc;

pub const MIN_SEASON: i64 = 2000;
pub const SUPPORTED_STAT_TYPES: [&str; 9] = [
    "pts", "reb", "ast", "stl", "blk", "min", "tov", "oreb", "dreb",
];

fn tool_error(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

fn arg_str(arguments: &Value, key: &str) -> String {
    match arguments.get(key) {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

/// Integers arrive as numbers or numeric strings depending on the model.
/// `2023.0` is accepted, `2023.9` is not.
fn arg_i64(arguments: &Value, key: &str) -> Option<i64> {
    match arguments.get(key)? {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().and_then(whole_f64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(whole_f64))
        }
        _ => None,
    }
}

fn whole_f64(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i64)
}

fn field_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn validate_season(season: Option<i64>) -> std::result::Result<i64, Value> {
    let current_year = i64::from(chrono::Local::now().year());
    match season {
        Some(season) if (MIN_SEASON..=current_year).contains(&season) => Ok(season),
        _ => Err(tool_error(format!(
            "Invalid year. Please use a year between {} and {}",
            MIN_SEASON, current_year
        ))),
    }
}

/// Picks one team by exact name, then by unique partial match.
pub fn resolve_team<'a>(teams: &'a [Value], team_name: &str) -> std::result::Result<&'a Value, String> {
    let needle = team_name.trim().to_lowercase();

    let exact = teams.iter().find(|team| {
        field_str(team, "full_name").to_lowercase() == needle
            || field_str(team, "name").to_lowercase() == needle
            || field_str(team, "abbreviation").to_lowercase() == needle
    });
    if let Some(team) = exact {
        return Ok(team);
    }

    let partial: Vec<&Value> = teams
        .iter()
        .filter(|team| {
            field_str(team, "full_name").to_lowercase().contains(&needle)
                || field_str(team, "name").to_lowercase().contains(&needle)
        })
        .collect();

    match partial.as_slice() {
        [team] => Ok(*team),
        [] => Err(format!("No team found with name {}", team_name)),
        _ => Err("Multiple teams found. Please use full team name.".to_string()),
    }
}

fn team_id(team: &Value) -> Option<i64> {
    team.get("id").and_then(Value::as_i64)
}

fn game_team_id(game: &Value, side: &str) -> Option<i64> {
    game.get(side).and_then(team_id)
}

pub struct NbaToolkit {
    api: BalldontlieClient,
}

impl NbaToolkit {
    pub fn new(api: BalldontlieClient) -> Self {
        Self { api }
    }

    pub async fn player_info(&self, first_name: &str, last_name: &str) -> Result<Value> {
        let (first_name, last_name) = (first_name.trim(), last_name.trim());
        if first_name.is_empty() || last_name.is_empty() {
            return Ok(tool_error("First name and last name are required"));
        }

        let players = self
            .api
            .get_data(
                "/players",
                &[
                    ("first_name", first_name.to_string()),
                    ("last_name", last_name.to_string()),
                ],
            )
            .await?;
        tracing::debug!("Found {} player candidates", players.len());

        let player = players.into_iter().find(|player| {
            field_str(player, "first_name").eq_ignore_ascii_case(first_name)
                && field_str(player, "last_name").eq_ignore_ascii_case(last_name)
        });

        Ok(player.unwrap_or_else(|| {
            tool_error(format!("No player found with name {} {}", first_name, last_name))
        }))
    }

    pub async fn team_info(&self, team_name: &str) -> Result<Value> {
        if team_name.trim().is_empty() {
            return Ok(tool_error("Team name is required"));
        }

        let teams = self.api.get_data("/teams", &[]).await?;
        Ok(match resolve_team(&teams, team_name) {
            Ok(team) => team.clone(),
            Err(message) => tool_error(message),
        })
    }

    pub async fn team_standings(&self, season: Option<i64>) -> Result<Value> {
        let season = match validate_season(season) {
            Ok(season) => season,
            Err(error) => return Ok(error),
        };

        let standings = self
            .api
            .get_data("/standings", &[("season", season.to_string())])
            .await?;
        tracing::debug!("Retrieved standings for {} with {} teams", season, standings.len());
        Ok(Value::Array(standings))
    }

    pub async fn league_leaders(&self, season: Option<i64>, stat_type: &str) -> Result<Value> {
        let stat_type = stat_type.trim().to_lowercase();
        if stat_type.is_empty() {
            return Ok(tool_error("Stat type is required"));
        }
        if !SUPPORTED_STAT_TYPES.contains(&stat_type.as_str()) {
            return Ok(tool_error(format!("Unsupported stat type {}", stat_type)));
        }
        let season = match validate_season(season) {
            Ok(season) => season,
            Err(error) => return Ok(error),
        };

        let leaders = self
            .api
            .get_data(
                "/leaders",
                &[("season", season.to_string()), ("stat_type", stat_type)],
            )
            .await?;
        Ok(Value::Array(leaders))
    }

    pub async fn game_odds(&self, game_date: Option<&str>, game_id: Option<i64>) -> Result<Value> {
        let game_date = game_date.map(str::trim).filter(|date| !date.is_empty());

        if let Some(date) = game_date {
            if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                return Ok(tool_error("Invalid date format. Please use YYYY-MM-DD"));
            }
            let odds = self
                .api
                .get_all_data("/odds", &[("date", date.to_string())])
                .await?;
            if odds.is_empty() {
                return Ok(tool_error("No games found for the specified date"));
            }
            return Ok(Value::Array(odds));
        }

        match game_id {
            Some(id) if id <= 0 => Ok(tool_error("Invalid game ID")),
            Some(id) => {
                let odds = self
                    .api
                    .get_all_data("/odds", &[("game_id", id.to_string())])
                    .await?;
                if odds.is_empty() {
                    Ok(tool_error(format!("No game found with ID {}", id)))
                } else {
                    Ok(Value::Array(odds))
                }
            }
            None => Ok(tool_error("Either game_date or game_id must be provided")),
        }
    }

    pub async fn player_injuries(&self) -> Result<Value> {
        let injuries = self.api.get_all_data("/player_injuries", &[]).await?;
        tracing::debug!("Retrieved {} player injuries", injuries.len());
        Ok(Value::Array(injuries))
    }

    pub async fn head_to_head(
        &self,
        team1_name: &str,
        team2_name: &str,
        season: Option<i64>,
    ) -> Result<Value> {
        if team1_name.trim().is_empty() || team2_name.trim().is_empty() {
            return Ok(tool_error("Both team names are required"));
        }
        let season = match validate_season(season) {
            Ok(season) => season,
            Err(error) => return Ok(error),
        };

        let teams = self.api.get_data("/teams", &[]).await?;
        let (team1, team2) = match (
            resolve_team(&teams, team1_name),
            resolve_team(&teams, team2_name),
        ) {
            (Ok(team1), Ok(team2)) => (team1, team2),
            _ => return Ok(tool_error("One or both teams not found")),
        };

        let (Some(team1_id), Some(team2_id)) = (team_id(team1), team_id(team2)) else {
            return Ok(tool_error("One or both teams not found"));
        };
        if team1_id == team2_id {
            return Ok(tool_error("Cannot compare a team with itself"));
        }

        let games = self
            .api
            .get_all_data(
                "/games",
                &[
                    ("team_ids[]", team1_id.to_string()),
                    ("team_ids[]", team2_id.to_string()),
                    ("seasons[]", season.to_string()),
                    ("per_page", "100".to_string()),
                ],
            )
            .await?;

        // The games endpoint returns every game of either team.
        let games: Vec<Value> = games
            .into_iter()
            .filter(|game| {
                let sides = (
                    game_team_id(game, "home_team"),
                    game_team_id(game, "visitor_team"),
                );
                sides == (Some(team1_id), Some(team2_id)) || sides == (Some(team2_id), Some(team1_id))
            })
            .collect();

        let (mut team1_wins, mut team2_wins) = (0u32, 0u32);
        for game in &games {
            let home_score = game.get("home_team_score").and_then(Value::as_i64).unwrap_or(0);
            let visitor_score = game
                .get("visitor_team_score")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            if home_score == visitor_score {
                continue;
            }

            let winner = if home_score > visitor_score {
                game_team_id(game, "home_team")
            } else {
                game_team_id(game, "visitor_team")
            };
            if winner == Some(team1_id) {
                team1_wins += 1;
            } else {
                team2_wins += 1;
            }
        }

        let mut stats = serde_json::Map::new();
        stats.insert("total_games".to_string(), json!(games.len()));
        stats.insert(format!("{}_wins", field_str(team1, "name")), json!(team1_wins));
        stats.insert(format!("{}_wins", field_str(team2, "name")), json!(team2_wins));
        stats.insert("games".to_string(), Value::Array(games));
        Ok(Value::Object(stats))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbaToolKind {
    PlayerInfo,
    TeamInfo,
    TeamStandings,
    LeagueLeaders,
    GameOdds,
    PlayerInjuries,
    HeadToHead,
}

impl NbaToolKind {
    pub const ALL: [NbaToolKind; 7] = [
        NbaToolKind::PlayerInjuries,
        NbaToolKind::GameOdds,
        NbaToolKind::HeadToHead,
        NbaToolKind::LeagueLeaders,
        NbaToolKind::PlayerInfo,
        NbaToolKind::TeamInfo,
        NbaToolKind::TeamStandings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NbaToolKind::PlayerInfo => "get_player_info",
            NbaToolKind::TeamInfo => "get_team_info",
            NbaToolKind::TeamStandings => "get_team_standings",
            NbaToolKind::LeagueLeaders => "get_league_leaders",
            NbaToolKind::GameOdds => "get_game_odds",
            NbaToolKind::PlayerInjuries => "get_player_injuries",
            NbaToolKind::HeadToHead => "get_head_to_head_stats",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            NbaToolKind::PlayerInfo => "Get detailed information about an NBA player: id, name, position, height, weight and team.",
            NbaToolKind::TeamInfo => "Get detailed information about an NBA team: id, full name, conference and division.",
            NbaToolKind::TeamStandings => "Get the NBA standings for a season, including wins, losses and conference rank for every team.",
            NbaToolKind::LeagueLeaders => "Get the NBA statistical leaders of a season for one stat category.",
            NbaToolKind::GameOdds => "Get betting odds (moneyline, spread, over/under) for NBA games on a date or for one game.",
            NbaToolKind::PlayerInjuries => "Get the current NBA injury report with player status and expected return.",
            NbaToolKind::HeadToHead => "Get head-to-head results between two NBA teams in a season.",
        }
    }

    pub fn parameters(&self) -> Value {
        let season = json!({
            "type": "integer",
            "description": "The season year, e.g. 2023 for the 2023-24 season"
        });

        match self {
            NbaToolKind::PlayerInfo => json!({
                "type": "object",
                "properties": {
                    "first_name": {"type": "string", "description": "Player first name, e.g. Stephen"},
                    "last_name": {"type": "string", "description": "Player last name, e.g. Curry"}
                },
                "required": ["first_name", "last_name"]
            }),
            NbaToolKind::TeamInfo => json!({
                "type": "object",
                "properties": {
                    "team_name": {"type": "string", "description": "Team name, e.g. Warriors or Golden State Warriors"}
                },
                "required": ["team_name"]
            }),
            NbaToolKind::TeamStandings => json!({
                "type": "object",
                "properties": {"season": season},
                "required": ["season"]
            }),
            NbaToolKind::LeagueLeaders => json!({
                "type": "object",
                "properties": {
                    "season": season,
                    "stat_type": {
                        "type": "string",
                        "description": "Stat category",
                        "enum": SUPPORTED_STAT_TYPES
                    }
                },
                "required": ["season", "stat_type"]
            }),
            NbaToolKind::GameOdds => json!({
                "type": "object",
                "properties": {
                    "game_date": {"type": "string", "description": "Date of the games in YYYY-MM-DD format"},
                    "game_id": {"type": "integer", "description": "A specific game id"}
                }
            }),
            NbaToolKind::PlayerInjuries => json!({
                "type": "object",
                "properties": {}
            }),
            NbaToolKind::HeadToHead => json!({
                "type": "object",
                "properties": {
                    "team1_name": {"type": "string", "description": "Name of the first team"},
                    "team2_name": {"type": "string", "description": "Name of the second team"},
                    "season": season
                },
                "required": ["team1_name", "team2_name", "season"]
            }),
        }
    }
}

pub struct NbaTool {
    kind: NbaToolKind,
    toolkit: Arc<NbaToolkit>,
}

impl NbaTool {
    pub fn new(kind: NbaToolKind, toolkit: Arc<NbaToolkit>) -> Self {
        Self { kind, toolkit }
    }
}

#[async_trait]
impl Tool for NbaTool {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn parameters(&self) -> Value {
        self.kind.parameters()
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        let toolkit = &self.toolkit;
        match self.kind {
            NbaToolKind::PlayerInfo => {
                toolkit
                    .player_info(
                        &arg_str(&arguments, "first_name"),
                        &arg_str(&arguments, "last_name"),
                    )
                    .await
            }
            NbaToolKind::TeamInfo => toolkit.team_info(&arg_str(&arguments, "team_name")).await,
            NbaToolKind::TeamStandings => {
                toolkit.team_standings(arg_i64(&arguments, "season")).await
            }
            NbaToolKind::LeagueLeaders => {
                toolkit
                    .league_leaders(
                        arg_i64(&arguments, "season"),
                        &arg_str(&arguments, "stat_type"),
                    )
                    .await
            }
            NbaToolKind::GameOdds => {
                let game_date = arg_str(&arguments, "game_date");
                toolkit
                    .game_odds(Some(game_date.as_str()), arg_i64(&arguments, "game_id"))
                    .await
            }
            NbaToolKind::PlayerInjuries => toolkit.player_injuries().await,
            NbaToolKind::HeadToHead => {
                toolkit
                    .head_to_head(
                        &arg_str(&arguments, "team1_name"),
                        &arg_str(&arguments, "team2_name"),
                        arg_i64(&arguments, "season"),
                    )
                    .await
            }
        }
    }
}

pub fn register_nba_tools(registry: &mut ToolRegistry, toolkit: Arc<NbaToolkit>) {
    for kind in NbaToolKind::ALL {
        registry.register(Arc::new(NbaTool::new(kind, toolkit.clone())));
    }
}
