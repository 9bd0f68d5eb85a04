//! OpenAI-compatible chat completion client and reply parsing.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Config, LLM_MAX_TOKENS, LLM_TEMPERATURE};
use crate::error::{AppError, Result};
use crate::types::ChatMessage;

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

pub struct LlmClient {
    base_url: String,
    model: String,
    http: Client,
}

impl LlmClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: cfg.openai_api_url.trim_end_matches('/').to_string(),
            model: cfg.openai_model.clone(),
            http,
        })
    }

    /// Send the conversation and return the first choice's content.
    pub async fn complete(&self, api_key: &str, messages: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: LLM_TEMPERATURE,
            max_tokens: LLM_MAX_TOKENS,
        };
        let url = format!("{}/chat/completions", self.base_url);
        debug!(messages = messages.len(), model = %self.model, "Sending chat completion request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("LLM API rejected the API key");
            return Err(AppError::InvalidApiKey);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "LLM API error: {body}");
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: upstream_error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string()),
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Llm("Invalid response format from OpenAI API".to_string()))?;

        debug!("LLM response received: {} chars", content.len());
        Ok(content)
    }
}

/// `{"error": {"message": "..."}}` or `{"error": "..."}`.
fn upstream_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let err = v.get("error")?;
    err.get("message")
        .and_then(Value::as_str)
        .or_else(|| err.as_str())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Structured form of an assistant reply. Plain-text replies land in `human_response`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantReply {
    pub intent: String,
    pub parameters: Value,
    pub api_calls: Vec<Value>,
    pub human_response: String,
}

/// Never fails: a fenced block is tried first, then the whole text, then the text is
/// used as-is.
pub fn parse_assistant_reply(text: &str) -> AssistantReply {
    let candidate = fenced_block(text).unwrap_or(text);
    let parsed: Option<Value> = serde_json::from_str(candidate.trim()).ok();
    if parsed.is_none() {
        debug!("Assistant reply is not JSON; using it as plain text");
    }
    let field = |key: &str| parsed.as_ref().and_then(|v| v.get(key));

    AssistantReply {
        intent: field("intent")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string(),
        parameters: field("parameters")
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())),
        api_calls: field("api_calls")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        human_response: field("human_response")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(text)
            .to_string(),
    }
}

/// Contents of the first closed ```` ``` ```` block. A language tag such as `json` or
/// `JSON` on the opening line is skipped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let is_tag = |info: &str| info.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let rest = match rest.split_once('\n') {
        Some((info, body)) if is_tag(info) => body,
        _ => rest,
    };
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LlmClient {
        let cfg = Config::for_urls("http://unused.invalid", &server.uri());
        LlmClient::new(&cfg).unwrap()
    }

    #[test]
    fn plain_text_becomes_human_response() {
        let reply = parse_assistant_reply("The Celtics are favored at -150.");
        assert_eq!(reply.intent, "unknown");
        assert_eq!(reply.human_response, "The Celtics are favored at -150.");
        assert!(reply.api_calls.is_empty());
        assert_eq!(reply.parameters, json!({}));
    }

    #[test]
    fn fenced_json_is_extracted() {
        let text = "Here you go:\n```json\n{\"intent\": \"odds\", \"parameters\": {\"leagueId\": 4}, \
                    \"api_calls\": [{\"endpoint\": \"/markets\"}], \"human_response\": \"NBA odds below.\"}\n```";
        let reply = parse_assistant_reply(text);
        assert_eq!(reply.intent, "odds");
        assert_eq!(reply.parameters, json!({ "leagueId": 4 }));
        assert_eq!(reply.api_calls.len(), 1);
        assert_eq!(reply.human_response, "NBA odds below.");
    }

    #[test]
    fn bare_json_without_human_response_falls_back_to_text() {
        let text = r#"{"intent": "greeting"}"#;
        let reply = parse_assistant_reply(text);
        assert_eq!(reply.intent, "greeting");
        assert_eq!(reply.human_response, text);
    }

    #[test]
    fn fence_tag_case_does_not_matter() {
        let text = "```JSON\n{\"intent\": \"odds\", \"human_response\": \"EPL odds below.\"}\n```";
        let reply = parse_assistant_reply(text);
        assert_eq!(reply.intent, "odds");
        assert_eq!(reply.human_response, "EPL odds below.");

        let inline = "```{\"intent\": \"greeting\"}```";
        assert_eq!(parse_assistant_reply(inline).intent, "greeting");
    }

    #[test]
    fn broken_fence_is_plain_text() {
        let text = "```json\n{\"intent\": ";
        assert_eq!(parse_assistant_reply(text).human_response, text);
    }

    #[tokio::test]
    async fn completion_sends_bearer_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-3.5-turbo", "max_tokens": 800 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "hello" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let out = client.complete("sk-test", &[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_invalid_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("bad", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidApiKey));
    }

    #[tokio::test]
    async fn server_error_carries_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({ "error": { "message": "Rate limit reached" } })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).complete("sk-test", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "API error: 429 Rate limit reached");
    }

    #[tokio::test]
    async fn empty_choices_is_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("sk-test", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }
}
