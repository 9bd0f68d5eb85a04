use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Please set your OpenAI API key first with: /apikey YOUR_API_KEY")]
    MissingApiKey,

    #[error("OpenAI API Key error: Your API key may be invalid or expired. Please set a valid API key with: /apikey YOUR_API_KEY")]
    InvalidApiKey,

    #[error("API error: {status} {message}")]
    Upstream { status: u16, message: String },

    #[error("LLM error: {0}")]
    Llm(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Credential problems are shown verbatim; everything else gets a generic prefix.
    pub fn user_message(&self) -> String {
        match self {
            AppError::MissingApiKey | AppError::InvalidApiKey => self.to_string(),
            _ => format!("Error processing your query: {self}"),
        }
    }
}
