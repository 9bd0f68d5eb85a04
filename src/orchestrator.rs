use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Config, HISTORY_LIMIT};
use crate::error::{AppError, Result};
use crate::fetcher::{MarketQuery, OvertimeClient};
use crate::formatter::format_for_llm;
use crate::llm::{parse_assistant_reply, LlmClient};
use crate::normalizer::normalize;
use crate::resolver::{extract_query_terms, market_type_label};
use crate::state::LeagueTable;
use crate::types::{ChatMessage, GameSummary, MarketRecord, QueryReply, QueryTerms};

pub const NO_MARKETS_FOUND: &str =
    "No markets found for your query. Try a different sport, league, or market type.";

const SYSTEM_PROMPT: &str = "You are a sports betting assistant that helps users understand betting markets and odds. \
You have access to the following market data. Please answer user questions based only on this data. \
Try to be helpful and explain odds when appropriate. If the user asks for something not in the data, \
politely explain what data you have available. Always favor accuracy over making up information.";

/// Process-wide state for one terminal session.
///
/// The league table is shared read-only. Everything else is mutated only by the
/// command loop, one query at a time.
pub struct Session {
    pub leagues: Arc<LeagueTable>,
    pub network_id: u32,
    pub debug: bool,
    api_key: Option<String>,
    history: Vec<ChatMessage>,
    odds: OvertimeClient,
    llm: LlmClient,
    /// Games from the last `/query` or `/live`, for `/gameid` prefix lookup.
    pub last_games: Vec<GameSummary>,
    /// Markets from the last `/gameid`, for `/type`.
    pub game_markets: Vec<MarketRecord>,
}

impl Session {
    pub fn new(cfg: &Config, leagues: Arc<LeagueTable>) -> Result<Self> {
        Ok(Self {
            leagues,
            network_id: cfg.network_id,
            debug: false,
            api_key: cfg.openai_api_key.clone(),
            history: Vec::new(),
            odds: OvertimeClient::new(cfg)?,
            llm: LlmClient::new(cfg)?,
            last_games: Vec::new(),
            game_markets: Vec::new(),
        })
    }

    pub fn odds(&self) -> &OvertimeClient {
        &self.odds
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn set_api_key(&mut self, key: impl Into<String>) {
        self.api_key = Some(key.into());
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Answer a natural-language query. Failures come back as an error reply.
    pub async fn answer(&mut self, query: &str) -> QueryReply {
        let Some(api_key) = self.api_key.clone() else {
            return QueryReply::failed(AppError::MissingApiKey.user_message(), QueryTerms::default());
        };

        let terms = extract_query_terms(&self.leagues, query);
        match self.answer_with(&api_key, query, terms).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Query failed: {e}");
                QueryReply::failed(e.user_message(), terms)
            }
        }
    }

    async fn answer_with(&mut self, api_key: &str, query: &str, terms: QueryTerms) -> Result<QueryReply> {
        let raw = self
            .odds
            .fetch_markets(self.network_id, &MarketQuery::from_terms(&terms))
            .await?;

        let records = normalize(&raw);
        if records.is_empty() {
            info!(?terms, "No markets for query");
            return Ok(QueryReply::ok(NO_MARKETS_FOUND, Some(raw), terms));
        }

        let mut context = format_for_llm(&records);
        if let Some(code) = terms.market_type {
            context.push_str(&format!("Requested market type: {}\n", market_type_label(code)));
        }
        if let Some(tf) = terms.timeframe {
            context.push_str(&format!("Requested timeframe: {tf}\n"));
        }

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(format!("{SYSTEM_PROMPT}\n\n{context}")));
        messages.extend(self.recent_history().iter().cloned());
        messages.push(ChatMessage::user(query));

        let text = self.llm.complete(api_key, &messages).await?;
        let reply = parse_assistant_reply(&text);
        info!(
            records = records.len(),
            intent = %reply.intent,
            api_calls = reply.api_calls.len(),
            parameters = %reply.parameters,
            "Answered query"
        );

        self.push_history(ChatMessage::user(query));
        self.push_history(ChatMessage::assistant(text));

        Ok(QueryReply::ok(reply.human_response, Some(raw), terms))
    }

    fn recent_history(&self) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(HISTORY_LIMIT);
        &self.history[start..]
    }

    fn push_history(&mut self, msg: ChatMessage) {
        self.history.push(msg);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::normalizer::tests::nba_game;
    use crate::state::league_table::tests::sample_table;
    use crate::types::Timeframe;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn session_for(odds: &MockServer, llm: &MockServer, api_key: Option<&str>) -> Session {
        let mut cfg = Config::for_urls(&odds.uri(), &llm.uri());
        cfg.openai_api_key = api_key.map(str::to_string);
        Session::new(&cfg, Arc::new(sample_table())).unwrap()
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_any_fetch() {
        let odds = MockServer::start().await;
        let llm = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&odds).await;

        let mut session = session_for(&odds, &llm, None);
        let reply = session.answer("nba games").await;
        assert!(reply.error);
        assert_eq!(reply.message, "Please set your OpenAI API key first with: /apikey YOUR_API_KEY");
    }

    #[tokio::test]
    async fn nba_games_today_end_to_end_with_plain_text_reply() {
        let odds = MockServer::start().await;
        let llm = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/overtime-v2/networks/10/markets"))
            .and(query_param("leagueId", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "markets": [
                nba_game("0xaaa", "Boston Celtics", "New York Knicks"),
                nba_game("0xbbb", "Denver Nuggets", "Los Angeles Lakers"),
            ]})))
            .expect(1)
            .mount(&odds)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Boston Celtics vs New York Knicks"))
            .and(body_string_contains("Denver Nuggets vs Los Angeles Lakers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": {
                    "role": "assistant",
                    "content": "Tonight the Boston Celtics host the New York Knicks, and the Denver Nuggets face the Los Angeles Lakers."
                }}]
            })))
            .expect(1)
            .mount(&llm)
            .await;

        let mut session = session_for(&odds, &llm, Some("sk-test-key-0123456789abcdef"));
        let reply = session.answer("show me nba games today").await;

        assert!(!reply.error, "unexpected error: {}", reply.message);
        assert_eq!(reply.terms.league_id, Some(4));
        assert_eq!(reply.terms.timeframe, Some(Timeframe::Today));
        assert!(reply.message.contains("Boston Celtics"));
        assert!(reply.message.contains("Los Angeles Lakers"));
        assert!(reply.data.is_some());
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn zero_markets_is_informational() {
        let odds = MockServer::start().await;
        let llm = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "markets": [] })))
            .mount(&odds)
            .await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&llm).await;

        let mut session = session_for(&odds, &llm, Some("sk-test-key-0123456789abcdef"));
        let reply = session.answer("curling odds").await;
        assert!(!reply.error);
        assert_eq!(reply.message, NO_MARKETS_FOUND);
    }

    #[tokio::test]
    async fn upstream_failure_is_an_error_reply() {
        let odds = MockServer::start().await;
        let llm = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&odds)
            .await;

        let mut session = session_for(&odds, &llm, Some("sk-test-key-0123456789abcdef"));
        let reply = session.answer("nfl spreads").await;
        assert!(reply.error);
        assert_eq!(reply.message, "Error processing your query: API error: 503 Service Unavailable");
        assert_eq!(reply.terms.league_id, Some(2));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn history_is_capped() {
        let odds = MockServer::start().await;
        let llm = MockServer::start().await;
        let mut session = session_for(&odds, &llm, None);
        for i in 0..15 {
            session.push_history(ChatMessage::user(format!("q{i}")));
        }
        assert_eq!(session.history().len(), HISTORY_LIMIT);
        assert_eq!(session.history()[0].content, "q5");
    }
}
