use tracing::{debug, warn};

use crate::config::MIN_API_KEY_LEN;
use crate::fetcher::MarketQuery;
use crate::formatter::{
    filter_by_type, filter_live_games, format_filtered_markets, format_for_display, format_game_list,
    format_league_listing, format_live_games, DisplayCard,
};
use crate::normalizer::{extract_live_games, extract_unique_games, normalize};
use crate::orchestrator::Session;
use crate::resolver::resolve_league;

pub const HELP_TEXT: &str = "\
Available commands:
/apikey YOUR_API_KEY - Set your OpenAI API key
/clear - Clear the terminal, conversation and cached responses
/help - Show this help message
/networkid NUMBER - Set the network ID (default: 10 for Optimism)
/debug - Toggle debug mode to see raw API responses
/leagueid [sport|league|id] - Show league IDs and details
/query LEAGUE - Query games for a specific league (e.g., /query nba)
/gameid ID - View markets for a specific game
/type TYPE - Filter markets by type
/live [league] - Show currently live games (optional league filter)

Key league IDs:
- NBA: 4
- NFL: 2
- MLB: 3
- NHL: 6
- EPL: 11
- MLS: 10
- NCAA Basketball: 5
- NCAA Football: 1
- UEFA Champions League: 16
- La Liga: 14
- Serie A: 15
- Bundesliga: 13
- Ligue 1: 12

Examples:
\"/query nba\" - Show all NBA games
\"/live\" - Show all live games across all leagues
\"/live nba\" - Show only live NBA games
\"/gameid 0x123...\" - Show markets for a specific game
\"/type moneyline\" - Filter markets by type

Anything else is sent to the assistant, e.g. \"show me nba games today\".";

/// One item for the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    System(String),
    Assistant(String),
    Error(String),
    Card(DisplayCard),
    /// Wipe the transcript.
    Clear,
}

fn system(s: impl Into<String>) -> Vec<Output> {
    vec![Output::System(s.into())]
}

/// Route one input line: `/`-prefixed lines are commands, anything else is a query.
pub async fn dispatch(session: &mut Session, line: &str) -> Vec<Output> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    if !line.starts_with('/') {
        return ask(session, line).await;
    }

    let (cmd, args) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c.to_lowercase(), a.trim()),
        None => (line.to_lowercase(), ""),
    };
    debug!(cmd = %cmd, args, "Dispatching command");

    match cmd.as_str() {
        "/help" => system(HELP_TEXT),
        "/clear" => {
            session.clear_history();
            session.odds().clear_cache();
            vec![Output::Clear, Output::System("Terminal cleared.".to_string())]
        }
        "/debug" => {
            session.debug = !session.debug;
            system(format!("Debug mode {}", if session.debug { "enabled" } else { "disabled" }))
        }
        "/apikey" => set_api_key(session, args),
        "/networkid" => set_network_id(session, args),
        "/leagueid" => system(format_league_listing(&session.leagues, Some(args))),
        "/query" => query_league(session, args).await,
        "/gameid" => query_game(session, args).await,
        "/type" => filter_type(session, args),
        "/live" => live_games(session, args).await,
        _ => system(format!("Unknown command: {cmd}. Type /help to see available commands.")),
    }
}

async fn ask(session: &mut Session, query: &str) -> Vec<Output> {
    let reply = session.answer(query).await;
    let mut out = Vec::new();
    if let Some(data) = &reply.data {
        debug_dump(session, data, &mut out);
    }
    out.push(if reply.error { Output::Error(reply.message) } else { Output::Assistant(reply.message) });
    out
}

fn set_api_key(session: &mut Session, key: &str) -> Vec<Output> {
    if key.is_empty() {
        return system("Please provide your OpenAI API key");
    }
    let len = key.chars().count();
    if len <= MIN_API_KEY_LEN {
        return vec![Output::Error(format!(
            "Error: The provided API key seems too short ({len} chars). OpenAI API keys are typically long strings."
        ))];
    }
    session.set_api_key(key);
    system("API Key set successfully! You can now query Overtime Markets data.")
}

fn set_network_id(session: &mut Session, arg: &str) -> Vec<Output> {
    if arg.is_empty() {
        return system(format!("Current network ID: {}", session.network_id));
    }
    match arg.parse::<u32>() {
        Ok(id) => {
            session.network_id = id;
            system(format!("Network ID set to {id}"))
        }
        Err(_) => vec![Output::Error("Error: Please provide a valid network ID. Usage: /networkid 10".to_string())],
    }
}

fn debug_dump(session: &Session, data: &serde_json::Value, out: &mut Vec<Output>) {
    if session.debug {
        out.push(Output::System(format!("Debug - API Response: {data}")));
    }
}

async fn query_league(session: &mut Session, name: &str) -> Vec<Output> {
    if name.is_empty() {
        return system("Please specify a league to query (e.g. /query nba)");
    }
    let Some(league_id) = resolve_league(&session.leagues, name) else {
        return system(format!("League \"{name}\" not found. Use /leagueid to see available leagues."));
    };

    let raw = match session.odds().fetch_markets(session.network_id, &MarketQuery::league(league_id)).await {
        Ok(v) => v,
        Err(e) => {
            warn!(league_id, "League query failed: {e}");
            return vec![Output::Error(format!("Error: {e}"))];
        }
    };

    let mut out = Vec::new();
    debug_dump(session, &raw, &mut out);

    let games = extract_unique_games(&raw);
    if games.is_empty() {
        out.push(Output::System(format!("No games found for league ID {league_id}")));
        return out;
    }
    let league_name = session.leagues.display_league(league_id);
    out.push(Output::System(format_game_list(&league_name, &games)));
    session.last_games = games;
    out
}

async fn query_game(session: &mut Session, id: &str) -> Vec<Output> {
    if id.is_empty() {
        return system("Please provide a game ID");
    }
    let needle = id.to_lowercase();
    let target = session
        .last_games
        .iter()
        .find(|g| g.game_id.to_lowercase().starts_with(&needle))
        .cloned();
    let game_id = target.as_ref().map(|g| g.game_id.clone()).unwrap_or_else(|| id.to_string());

    let raw = match session.odds().fetch_game(session.network_id, &game_id).await {
        Ok(v) => v,
        Err(e) => {
            warn!(game_id = %game_id, "Game query failed: {e}");
            return vec![Output::Error(format!("Error: {e}"))];
        }
    };

    let mut out = Vec::new();
    debug_dump(session, &raw, &mut out);

    session.game_markets = normalize(&raw);
    match format_for_display(&session.leagues, &session.game_markets, target.as_ref()) {
        Some(card) => out.push(Output::Card(card)),
        None => out.push(Output::System("No markets found for this game.".to_string())),
    }
    out
}

fn filter_type(session: &Session, market_type: &str) -> Vec<Output> {
    if market_type.is_empty() {
        return system("Please provide a market type");
    }
    if session.game_markets.is_empty() {
        return system("No game markets loaded. First query a game with /gameid.");
    }
    let matching = filter_by_type(&session.game_markets, market_type);
    system(format_filtered_markets(&session.leagues, market_type, &matching))
}

async fn live_games(session: &mut Session, filter: &str) -> Vec<Output> {
    let filter = (!filter.is_empty()).then_some(filter);
    let league_id = filter.and_then(|f| f.parse::<i64>().ok());

    let raw = match session.odds().fetch_live_markets(session.network_id, league_id).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Live markets query failed: {e}");
            return vec![Output::Error(format!("Error: {e}"))];
        }
    };

    let mut out = Vec::new();
    debug_dump(session, &raw, &mut out);

    let games = filter_live_games(extract_live_games(&raw), filter);
    session.last_games = games.iter().map(|g| g.game.clone()).collect();
    if games.is_empty() {
        out.push(Output::System(
            "No live games found. Try again later or check for specific leagues.".to_string(),
        ));
    } else {
        out.push(Output::System(format_live_games(&games)));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::tests::nba_game;
    use crate::orchestrator::tests::session_for;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text(out: &[Output]) -> String {
        out.iter()
            .map(|o| match o {
                Output::System(s) | Output::Assistant(s) | Output::Error(s) => s.clone(),
                Output::Card(c) => c.to_markup(),
                Output::Clear => "<clear>".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn servers() -> (MockServer, MockServer) {
        (MockServer::start().await, MockServer::start().await)
    }

    #[tokio::test]
    async fn help_and_unknown() {
        let (odds, llm) = servers().await;
        let mut s = session_for(&odds, &llm, None);
        assert!(text(&dispatch(&mut s, "/help").await).contains("/live [league]"));
        assert_eq!(
            text(&dispatch(&mut s, "/bogus").await),
            "Unknown command: /bogus. Type /help to see available commands."
        );
        assert!(dispatch(&mut s, "   ").await.is_empty());
    }

    #[tokio::test]
    async fn api_key_must_be_long_enough() {
        let (odds, llm) = servers().await;
        let mut s = session_for(&odds, &llm, None);

        let out = dispatch(&mut s, "/apikey short").await;
        assert!(matches!(&out[0], Output::Error(m) if m.contains("(5 chars)")));
        assert!(!s.has_api_key());

        dispatch(&mut s, "/apikey sk-0123456789abcdefghij").await;
        assert!(s.has_api_key());
    }

    #[tokio::test]
    async fn network_id_show_set_and_reject() {
        let (odds, llm) = servers().await;
        let mut s = session_for(&odds, &llm, None);
        assert_eq!(text(&dispatch(&mut s, "/networkid").await), "Current network ID: 10");
        assert_eq!(text(&dispatch(&mut s, "/NetworkID 8453").await), "Network ID set to 8453");
        assert_eq!(s.network_id, 8453);
        assert!(matches!(dispatch(&mut s, "/networkid op").await[0], Output::Error(_)));
    }

    #[tokio::test]
    async fn debug_toggles_and_clear_resets() {
        let (odds, llm) = servers().await;
        let mut s = session_for(&odds, &llm, None);
        assert_eq!(text(&dispatch(&mut s, "/debug").await), "Debug mode enabled");
        assert!(s.debug);
        assert_eq!(dispatch(&mut s, "/clear").await[0], Output::Clear);
    }

    #[tokio::test]
    async fn query_lists_games_then_gameid_prefix_shows_card() {
        let (odds, llm) = servers().await;
        let game_id = "0xabcdef0123456789abcdef";
        Mock::given(method("GET"))
            .and(path("/overtime-v2/networks/10/markets"))
            .and(query_param("leagueId", "4"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Basketball": { "4": [nba_game(game_id, "Boston Celtics", "New York Knicks")] }
            })))
            .mount(&odds)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/overtime-v2/networks/10/markets/{game_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(nba_game(game_id, "Boston Celtics", "New York Knicks")))
            .expect(1)
            .mount(&odds)
            .await;

        let mut s = session_for(&odds, &llm, None);
        let listing = text(&dispatch(&mut s, "/query nba").await);
        assert!(listing.starts_with("1 Games for NBA\n[0xabcdef...] New York Knicks @ Boston Celtics"));

        let out = dispatch(&mut s, "/gameid 0xABCDEF").await;
        let Output::Card(card) = &out[0] else { panic!("expected a card, got {out:?}") };
        assert_eq!(card.title(), "New York Knicks @ Boston Celtics");
        assert_eq!(card.spreads.len(), 2);

        let spreads = text(&dispatch(&mut s, "/type spread").await);
        assert!(spreads.contains("Showing Point Spread Markets"));
        assert!(spreads.ends_with("2 markets found"));
    }

    #[tokio::test]
    async fn unknown_league_and_type_without_game() {
        let (odds, llm) = servers().await;
        let mut s = session_for(&odds, &llm, None);
        assert_eq!(
            text(&dispatch(&mut s, "/query quidditch").await),
            "League \"quidditch\" not found. Use /leagueid to see available leagues."
        );
        assert_eq!(
            text(&dispatch(&mut s, "/type winner").await),
            "No game markets loaded. First query a game with /gameid."
        );
    }

    #[tokio::test]
    async fn live_filters_ongoing_games() {
        let (odds, llm) = servers().await;
        Mock::given(method("GET"))
            .and(path("/overtime-v2/networks/10/live-markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "markets": [
                { "gameId": "1", "sport": "Basketball", "leagueId": 4, "leagueName": "NBA",
                  "homeTeam": "H", "awayTeam": "A", "statusCode": "ongoing", "homeScore": 10, "awayScore": 8 },
                { "gameId": "2", "sport": "Soccer", "leagueId": 11, "leagueName": "EPL",
                  "homeTeam": "X", "awayTeam": "Y", "statusCode": "ongoing" }
            ]})))
            .mount(&odds)
            .await;

        let mut s = session_for(&odds, &llm, None);
        let all = text(&dispatch(&mut s, "/live").await);
        assert!(all.starts_with("Live Games (2)"));

        let soccer = text(&dispatch(&mut s, "/live soccer").await);
        assert!(soccer.starts_with("Live Games (1)\n\nSoccer: EPL (1)"));
        assert_eq!(s.last_games.len(), 1);

        let none = text(&dispatch(&mut s, "/live cricket").await);
        assert_eq!(none, "No live games found. Try again later or check for specific leagues.");
    }

    #[tokio::test]
    async fn plain_text_without_key_is_an_error() {
        let (odds, llm) = servers().await;
        let mut s = session_for(&odds, &llm, None);
        let out = dispatch(&mut s, "who wins tonight?").await;
        assert_eq!(
            out,
            vec![Output::Error("Please set your OpenAI API key first with: /apikey YOUR_API_KEY".to_string())]
        );
    }
}
