use crate::error::{AppError, Result};

pub const OVERTIME_API_URL: &str = "https://overtimemarketsv2.xyz";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Optimism.
pub const DEFAULT_NETWORK_ID: u32 = 10;

/// Conversation messages forwarded to the LLM alongside the current query.
pub const HISTORY_LIMIT: usize = 10;

/// Records kept in the LLM market context. Keeps the prompt small.
pub const LLM_MARKET_LIMIT: usize = 10;

/// `limit` sent on natural-language market fetches.
pub const DEFAULT_MARKET_LIMIT: u32 = 20;

/// `limit` sent by `/query <league>`.
pub const LEAGUE_QUERY_LIMIT: u32 = 50;

pub const LLM_TEMPERATURE: f32 = 0.7;
pub const LLM_MAX_TOKENS: u32 = 800;

/// `/apikey` rejects anything this short or shorter.
pub const MIN_API_KEY_LEN: usize = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub overtime_api_url: String,
    pub openai_api_url: String,
    /// Optional at startup; can be set later with `/apikey` (OPENAI_API_KEY)
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub network_id: u32,
    /// JSON reference table keyed by league ID (LEAGUE_DATA_PATH)
    pub league_data_path: String,
    pub cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
    pub log_level: String,
    /// Directory for the log file; the TUI owns stdout (LOG_DIR)
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            overtime_api_url: std::env::var("OVERTIME_API_URL")
                .unwrap_or_else(|_| OVERTIME_API_URL.to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| OPENAI_API_URL.to_string()),
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| OPENAI_MODEL.to_string()),
            network_id: std::env::var("NETWORK_ID")
                .unwrap_or_else(|_| DEFAULT_NETWORK_ID.to_string())
                .parse::<u32>()
                .map_err(|_| AppError::Config("NETWORK_ID must be a positive integer".to_string()))?,
            league_data_path: std::env::var("LEAGUE_DATA_PATH")
                .unwrap_or_else(|_| "data/leagues.json".to_string()),
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("CACHE_TTL_SECS must be a number of seconds".to_string()))?,
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("HTTP_TIMEOUT_SECS must be a number of seconds".to_string()))?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }

    /// Defaults with both API base URLs pointed somewhere else. Used by tests.
    #[cfg(test)]
    pub fn for_urls(overtime_api_url: &str, openai_api_url: &str) -> Self {
        Self {
            overtime_api_url: overtime_api_url.to_string(),
            openai_api_url: openai_api_url.to_string(),
            openai_api_key: None,
            openai_model: OPENAI_MODEL.to_string(),
            network_id: DEFAULT_NETWORK_ID,
            league_data_path: "data/leagues.json".to_string(),
            cache_ttl_secs: 300,
            http_timeout_secs: 5,
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}
