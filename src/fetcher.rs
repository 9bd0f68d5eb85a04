use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_MARKET_LIMIT, LEAGUE_QUERY_LIMIT};
use crate::error::{AppError, Result};
use crate::state::ResponseCache;
use crate::types::QueryTerms;

/// Filters for `GET /markets`. Unset fields are left off the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketQuery {
    pub limit: u32,
    pub league_id: Option<i64>,
    pub market_type: Option<i64>,
}

impl Default for MarketQuery {
    fn default() -> Self {
        Self { limit: DEFAULT_MARKET_LIMIT, league_id: None, market_type: None }
    }
}

impl MarketQuery {
    pub fn from_terms(terms: &QueryTerms) -> Self {
        Self { league_id: terms.league_id, market_type: terms.market_type, ..Self::default() }
    }

    /// Wider page used when listing every game in one league.
    pub fn league(league_id: i64) -> Self {
        Self { limit: LEAGUE_QUERY_LIMIT, league_id: Some(league_id), market_type: None }
    }

    fn query_string(&self) -> String {
        let mut params = vec![format!("limit={}", self.limit)];
        if let Some(id) = self.league_id {
            params.push(format!("leagueId={id}"));
        }
        if let Some(t) = self.market_type {
            params.push(format!("marketType={t}"));
        }
        params.join("&")
    }
}

// ---------------------------------------------------------------------------
// OvertimeClient
// ---------------------------------------------------------------------------

/// Odds API client. Every successful response is cached by full URL.
pub struct OvertimeClient {
    base_url: String,
    http: Client,
    cache: ResponseCache<Value>,
    cache_ttl_secs: u64,
}

impl OvertimeClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: cfg.overtime_api_url.trim_end_matches('/').to_string(),
            http,
            cache: ResponseCache::new(),
            cache_ttl_secs: cfg.cache_ttl_secs,
        })
    }

    fn network_url(&self, network_id: u32) -> String {
        format!("{}/overtime-v2/networks/{network_id}", self.base_url)
    }

    pub async fn fetch_markets(&self, network_id: u32, query: &MarketQuery) -> Result<Value> {
        let url = format!("{}/markets?{}", self.network_url(network_id), query.query_string());
        self.get_json(&url).await
    }

    /// The ID is a single path segment, so `/` and `?` in user input are escaped.
    pub async fn fetch_game(&self, network_id: u32, game_id: &str) -> Result<Value> {
        let mut url = Url::parse(&self.network_url(network_id))
            .map_err(|e| AppError::Config(format!("Invalid odds API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("Odds API URL cannot take a path".to_string()))?
            .push("markets")
            .push(game_id.trim());
        self.get_json(url.as_str()).await
    }

    pub async fn fetch_live_markets(&self, network_id: u32, league_id: Option<i64>) -> Result<Value> {
        let mut url = format!("{}/live-markets", self.network_url(network_id));
        if let Some(id) = league_id {
            url.push_str(&format!("?leagueId={id}"));
        }
        self.get_json(&url).await
    }

    pub fn clear_cache(&self) {
        if self.cache.is_empty() {
            return;
        }
        debug!(entries = self.cache.len(), "Clearing response cache");
        self.cache.clear();
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        if let Some(hit) = self.cache.get(url) {
            debug!(url, "Odds API cache hit");
            return Ok(hit);
        }

        debug!(url, "Fetching from odds API");
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Odds API error: {body}");
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body: Value = resp.json().await?;
        self.cache.set(url, body.clone(), self.cache_ttl_secs);
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
