use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// One row of the league reference file, keyed there by the stringified `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueEntry {
    pub id: i64,
    pub sport: String,
    pub label: String,
    #[serde(rename = "opticOddsName", default)]
    pub alt_name: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(rename = "isDrawAvailable", default)]
    pub draw_available: Option<bool>,
}

impl LeagueEntry {
    /// Full name when the source has one, else the short label.
    pub fn display_name(&self) -> &str {
        self.alt_name.as_deref().unwrap_or(&self.label)
    }
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
    PlayerProp,
    Futures,
    Other,
}

impl MarketType {
    /// Map the API's `type` string, falling back to `originalMarketName`.
    pub fn from_api(type_name: &str, market_name: Option<&str>) -> Self {
        let t = type_name.to_ascii_lowercase();
        let by_type = match t.as_str() {
            "winner" | "moneyline" => Some(MarketType::Moneyline),
            "spread" | "handicap" => Some(MarketType::Spread),
            "total" => Some(MarketType::Total),
            "futures" | "future" | "outright" => Some(MarketType::Futures),
            _ if t.starts_with("playerprops") || t.starts_with("player_props") => {
                Some(MarketType::PlayerProp)
            }
            _ => None,
        };
        if let Some(kind) = by_type {
            return kind;
        }
        match market_name {
            Some("Moneyline") => MarketType::Moneyline,
            Some("Point Spread") => MarketType::Spread,
            Some("Total") => MarketType::Total,
            _ => MarketType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    pub american: Option<f64>,
    pub decimal: Option<f64>,
}

/// A flattened market, parent or child, normalized from any response shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketRecord {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport: String,
    pub league_id: Option<i64>,
    pub league_name: String,
    pub maturity: Option<DateTime<Utc>>,
    pub market_type: MarketType,
    /// Raw API `type`, e.g. `winner` or `playerPropsPoints`.
    pub type_name: String,
    /// Raw API `originalMarketName`, when present.
    pub market_name: Option<String>,
    pub line: Option<f64>,
    pub odds: Vec<Odds>,
    pub status_code: Option<String>,
    pub is_child_market: bool,
}

/// One unique game, as listed by `/query` and `/live`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSummary {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport: String,
    pub league_id: Option<i64>,
    pub league_name: String,
    pub maturity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveGame {
    pub game: GameSummary,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub game_clock: Option<String>,
    pub game_period: Option<String>,
    pub status_code: String,
}

// ---------------------------------------------------------------------------
// Query terms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Today,
    Tomorrow,
    ThisWeek,
    Live,
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::Today => "today",
            Timeframe::Tomorrow => "tomorrow",
            Timeframe::ThisWeek => "this week",
            Timeframe::Live => "live",
        };
        write!(f, "{s}")
    }
}

/// Filters derived from one natural-language query. Discarded after use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryTerms {
    pub league_id: Option<i64>,
    pub market_type: Option<i64>,
    pub timeframe: Option<Timeframe>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Result of one natural-language query. Failures are carried, never raised.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReply {
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub terms: QueryTerms,
    pub error: bool,
}

impl QueryReply {
    pub fn ok(message: impl Into<String>, data: Option<serde_json::Value>, terms: QueryTerms) -> Self {
        Self { message: message.into(), data, terms, error: false }
    }

    pub fn failed(message: impl Into<String>, terms: QueryTerms) -> Self {
        Self { message: message.into(), data: None, terms, error: true }
    }
}
