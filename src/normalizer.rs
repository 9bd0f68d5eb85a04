use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{GameSummary, LiveGame, MarketRecord, MarketType, Odds};

// ---------------------------------------------------------------------------
// Shape classification
// ---------------------------------------------------------------------------

/// The payload layouts the odds API is known to return.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadShape<'a> {
    /// One market object with `gameId` and `odds`, children under `childMarkets`.
    SingleMarket(&'a Map<String, Value>),
    /// `{ sport: { leagueId: [market, ...] } }`.
    Nested(&'a Map<String, Value>),
    /// `{ markets: [market, ...] }`.
    MarketsArray(&'a [Value]),
    /// `[market, ...]`.
    BareArray(&'a [Value]),
    Unrecognized,
}

impl PayloadShape<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            PayloadShape::SingleMarket(_) => "single",
            PayloadShape::Nested(_) => "nested",
            PayloadShape::MarketsArray(_) => "markets",
            PayloadShape::BareArray(_) => "array",
            PayloadShape::Unrecognized => "unrecognized",
        }
    }
}

pub fn classify(raw: &Value) -> PayloadShape<'_> {
    match raw {
        Value::Object(obj) => {
            if obj.contains_key("gameId") && obj.contains_key("odds") {
                return PayloadShape::SingleMarket(obj);
            }
            let nested = obj.values().any(|v| {
                v.as_object()
                    .is_some_and(|inner| inner.values().any(Value::is_array))
            });
            if nested {
                return PayloadShape::Nested(obj);
            }
            match obj.get("markets").and_then(Value::as_array) {
                Some(items) => PayloadShape::MarketsArray(items),
                None => PayloadShape::Unrecognized,
            }
        }
        Value::Array(items) => PayloadShape::BareArray(items),
        _ => PayloadShape::Unrecognized,
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// Flatten any supported payload into parent and child market records.
/// Entries without a `gameId` are dropped; an unknown shape yields an empty list.
pub fn normalize(raw: &Value) -> Vec<MarketRecord> {
    let shape = classify(raw);
    let records = match shape {
        PayloadShape::SingleMarket(obj) => flatten_single(obj),
        PayloadShape::Nested(obj) => flatten_nested(obj),
        PayloadShape::MarketsArray(items) | PayloadShape::BareArray(items) => flatten_list(items),
        PayloadShape::Unrecognized => Vec::new(),
    };
    debug!(shape = shape.name(), records = records.len(), "Normalized odds payload");
    records
}

fn flatten_single(obj: &Map<String, Value>) -> Vec<MarketRecord> {
    let mut out = Vec::new();
    flatten_market_object(obj, &mut out);
    out
}

fn flatten_nested(obj: &Map<String, Value>) -> Vec<MarketRecord> {
    let mut out = Vec::new();
    for leagues in obj.values().filter_map(Value::as_object) {
        for markets in leagues.values().filter_map(Value::as_array) {
            for market in markets {
                flatten_market(market, &mut out);
            }
        }
    }
    out
}

fn flatten_list(items: &[Value]) -> Vec<MarketRecord> {
    let mut out = Vec::new();
    for market in items {
        flatten_market(market, &mut out);
    }
    out
}

fn flatten_market(v: &Value, out: &mut Vec<MarketRecord>) {
    if let Some(obj) = v.as_object() {
        flatten_market_object(obj, out);
    }
}

/// Push the parent (if it has a game ID) followed by each of its children.
fn flatten_market_object(obj: &Map<String, Value>, out: &mut Vec<MarketRecord>) {
    let parent = parse_market(obj, None, false);
    if let Some(p) = &parent {
        out.push(p.clone());
    }
    let Some(children) = obj.get("childMarkets").and_then(Value::as_array) else {
        return;
    };
    for child in children.iter().filter_map(Value::as_object) {
        if let Some(record) = parse_market(child, parent.as_ref(), true) {
            out.push(record);
        }
    }
}

/// Build one record. Children missing team/sport/league fields take them from the parent.
fn parse_market(
    obj: &Map<String, Value>,
    parent: Option<&MarketRecord>,
    is_child_market: bool,
) -> Option<MarketRecord> {
    let game_id = scalar_text(obj.get("gameId")?)?;

    let text = |key: &str, inherited: Option<&String>| -> String {
        str_field(obj, key)
            .map(str::to_string)
            .or_else(|| inherited.cloned())
            .unwrap_or_default()
    };

    let type_name = str_field(obj, "type").unwrap_or_default().to_string();
    let market_name = str_field(obj, "originalMarketName").map(str::to_string);
    let market_type = MarketType::from_api(&type_name, market_name.as_deref());

    let odds = obj
        .get("odds")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(parse_odds).collect())
        .unwrap_or_default();

    Some(MarketRecord {
        home_team: text("homeTeam", parent.map(|p| &p.home_team)),
        away_team: text("awayTeam", parent.map(|p| &p.away_team)),
        sport: text("sport", parent.map(|p| &p.sport)),
        league_id: obj
            .get("leagueId")
            .and_then(lenient_i64)
            .or_else(|| parent.and_then(|p| p.league_id)),
        league_name: text("leagueName", parent.map(|p| &p.league_name)),
        maturity: parse_maturity(obj).or_else(|| parent.and_then(|p| p.maturity)),
        market_type,
        type_name,
        market_name,
        line: obj.get("line").and_then(lenient_f64),
        odds,
        status_code: str_field(obj, "statusCode").map(str::to_string),
        is_child_market,
        game_id,
    })
}

fn parse_odds(v: &Value) -> Odds {
    Odds {
        american: v.get("american").and_then(lenient_f64),
        decimal: v.get("decimal").and_then(lenient_f64),
    }
}

/// `maturityDate` as RFC 3339, else `maturity` as unix seconds (or milliseconds).
fn parse_maturity(obj: &Map<String, Value>) -> Option<DateTime<Utc>> {
    if let Some(dt) = str_field(obj, "maturityDate").and_then(parse_rfc3339) {
        return Some(dt);
    }
    match obj.get("maturity")? {
        Value::String(s) => parse_rfc3339(s).or_else(|| s.parse::<i64>().ok().and_then(from_unix)),
        v => v.as_i64().and_then(from_unix),
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn lenient_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

/// One entry per `gameId`, first occurrence wins. Only parent markets naming both teams count.
pub fn extract_unique_games(raw: &Value) -> Vec<GameSummary> {
    let mut seen = HashSet::new();
    normalize(raw)
        .into_iter()
        .filter(|r| !r.is_child_market && !r.home_team.is_empty() && !r.away_team.is_empty())
        .filter(|r| seen.insert(r.game_id.clone()))
        .map(|r| summary_of(&r))
        .collect()
}

/// Ongoing games from a live-markets payload, with score and clock when present.
pub fn extract_live_games(raw: &Value) -> Vec<LiveGame> {
    let Some(items) = raw.get("markets").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut games = Vec::new();
    for obj in items.iter().filter_map(Value::as_object) {
        if str_field(obj, "statusCode") != Some("ongoing") {
            continue;
        }
        let Some(record) = parse_market(obj, None, false) else {
            continue;
        };
        if !seen.insert(record.game_id.clone()) {
            continue;
        }
        games.push(LiveGame {
            game: summary_of(&record),
            home_score: obj.get("homeScore").and_then(lenient_i64),
            away_score: obj.get("awayScore").and_then(lenient_i64),
            game_clock: obj.get("gameClock").and_then(scalar_text),
            game_period: obj.get("gamePeriod").and_then(scalar_text),
            status_code: record.status_code.unwrap_or_default(),
        });
    }
    games
}

fn summary_of(r: &MarketRecord) -> GameSummary {
    GameSummary {
        game_id: r.game_id.clone(),
        home_team: r.home_team.clone(),
        away_team: r.away_team.clone(),
        sport: r.sport.clone(),
        league_id: r.league_id,
        league_name: r.league_name.clone(),
        maturity: r.maturity,
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn nba_game(game_id: &str, home: &str, away: &str) -> Value {
        json!({
            "gameId": game_id,
            "sport": "Basketball",
            "leagueId": 4,
            "leagueName": "NBA",
            "homeTeam": home,
            "awayTeam": away,
            "maturityDate": "2026-10-20T00:00:00Z",
            "type": "winner",
            "line": 0,
            "odds": [
                { "american": -150.0, "decimal": 1.667 },
                { "american": 130.0, "decimal": 2.3 }
            ],
            "childMarkets": [
                {
                    "gameId": game_id,
                    "type": "spread",
                    "line": -3.5,
                    "odds": [{ "american": -110.0 }, { "american": -110.0 }]
                },
                {
                    "gameId": game_id,
                    "type": "spread",
                    "line": 3.5,
                    "odds": [{ "american": -105.0 }, { "american": -115.0 }]
                }
            ]
        })
    }

    fn two_games() -> (Value, Value) {
        (
            nba_game("0xaaa", "Boston Celtics", "New York Knicks"),
            nba_game("0xbbb", "Denver Nuggets", "Los Angeles Lakers"),
        )
    }

    #[test]
    fn classifies_each_shape() {
        let (a, b) = two_games();
        assert!(matches!(classify(&a), PayloadShape::SingleMarket(_)));
        assert!(matches!(
            classify(&json!({ "Basketball": { "4": [a.clone()] } })),
            PayloadShape::Nested(_)
        ));
        assert!(matches!(classify(&json!({ "markets": [a.clone()] })), PayloadShape::MarketsArray(_)));
        assert!(matches!(classify(&json!([a, b])), PayloadShape::BareArray(_)));
        assert_eq!(classify(&json!("nope")), PayloadShape::Unrecognized);
        assert_eq!(classify(&json!({ "error": "bad" })), PayloadShape::Unrecognized);
    }

    #[test]
    fn same_markets_flatten_identically_across_shapes() {
        let (a, b) = two_games();

        let bare = normalize(&json!([a.clone(), b.clone()]));
        let wrapped = normalize(&json!({ "markets": [a.clone(), b.clone()] }));
        let nested = normalize(&json!({ "Basketball": { "4": [a.clone(), b.clone()] } }));
        assert_eq!(bare.len(), 6);
        assert_eq!(bare, wrapped);
        assert_eq!(bare, nested);

        let single = normalize(&a);
        assert_eq!(single, normalize(&json!([a])));
    }

    #[test]
    fn nested_spreads_across_leagues_and_sports() {
        let (a, b) = two_games();
        let raw = json!({
            "Basketball": { "4": [a], "5": [] },
            "Hockey": { "6": [b] }
        });
        let records = normalize(&raw);
        let ids: Vec<&str> = records
            .iter()
            .filter(|r| !r.is_child_market)
            .map(|r| r.game_id.as_str())
            .collect();
        assert_eq!(ids, vec!["0xaaa", "0xbbb"]);
    }

    #[test]
    fn children_are_tagged_and_inherit_teams() {
        let (a, _) = two_games();
        let records = normalize(&a);
        assert!(!records[0].is_child_market);
        assert!(records[1..].iter().all(|r| r.is_child_market));

        let child = &records[1];
        assert_eq!(child.market_type, MarketType::Spread);
        assert_eq!(child.line, Some(-3.5));
        assert_eq!(child.home_team, "Boston Celtics");
        assert_eq!(child.league_id, Some(4));
    }

    #[test]
    fn entries_without_game_id_are_dropped() {
        let raw = json!([
            { "homeTeam": "A", "awayTeam": "B", "odds": [] },
            { "gameId": "", "odds": [] },
            "not an object",
            { "gameId": 77, "type": "total", "line": "220.5", "odds": [{ "decimal": 1.9 }] }
        ]);
        let records = normalize(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].game_id, "77");
        assert_eq!(records[0].line, Some(220.5));
        assert_eq!(records[0].odds[0], Odds { american: None, decimal: Some(1.9) });
    }

    #[test]
    fn unrecognized_payloads_are_empty() {
        assert!(normalize(&Value::Null).is_empty());
        assert!(normalize(&json!(42)).is_empty());
        assert!(normalize(&json!({ "status": "ok" })).is_empty());
    }

    #[test]
    fn maturity_from_date_string_or_unix_seconds() {
        let from_date = normalize(&json!([{ "gameId": "g", "maturityDate": "2026-01-02T03:04:05Z" }]));
        let from_unix = normalize(&json!([{ "gameId": "g", "maturity": 1767323045 }]));
        assert_eq!(from_date[0].maturity, from_unix[0].maturity);
        assert!(from_date[0].maturity.is_some());
    }

    #[test]
    fn unique_games_keep_first_parent_per_id() {
        let (a, b) = two_games();
        let games = extract_unique_games(&json!([a.clone(), b, a]));
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].home_team, "Boston Celtics");
        assert_eq!(games[1].away_team, "Los Angeles Lakers");
    }

    #[test]
    fn live_games_only_ongoing() {
        let raw = json!({ "markets": [
            { "gameId": "1", "homeTeam": "A", "awayTeam": "B", "statusCode": "ongoing",
              "homeScore": 54, "awayScore": "49", "gameClock": "04:12", "gamePeriod": "Q3" },
            { "gameId": "1", "homeTeam": "A", "awayTeam": "B", "statusCode": "ongoing" },
            { "gameId": "2", "homeTeam": "C", "awayTeam": "D", "statusCode": "open" }
        ]});
        let live = extract_live_games(&raw);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].home_score, Some(54));
        assert_eq!(live[0].away_score, Some(49));
        assert_eq!(live[0].game_period.as_deref(), Some("Q3"));
        assert!(extract_live_games(&json!([])).is_empty());
    }
}
