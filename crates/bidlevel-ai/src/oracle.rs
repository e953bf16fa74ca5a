//! The oracle seam: one chat-completion call with a system instruction and a
//! list of evidence text blocks.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{parse_http_error, OracleError};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Which pipeline step a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Aggregation,
    Scoring,
    LenientScoring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub purpose: Purpose,
    pub system: String,
    pub blocks: Vec<String>,
    pub max_tokens: u32,
}

impl OracleRequest {
    pub fn char_len(&self) -> usize {
        self.system.len() + self.blocks.iter().map(String::len).sum::<usize>()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl OracleResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Reported usage, or a chars/4 estimate when the provider reported none.
    pub fn tokens_used(&self, request: &OracleRequest) -> u64 {
        let reported = self.input_tokens + self.output_tokens;
        if reported > 0 {
            reported
        } else {
            ((request.char_len() + self.text.len()) / 4) as u64
        }
    }
}

/// A large-language-model completion service.
///
/// `Send + Sync` so several scorers could share one oracle behind a rate limiter.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, request: OracleRequest) -> Result<OracleResponse, OracleError>;

    /// Fail fast on configuration problems before any work is done.
    fn check_config(&self) -> Result<(), OracleError> {
        Ok(())
    }
}

// ── Anthropic Messages API ──

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            endpoint: ANTHROPIC_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

pub struct AnthropicOracle {
    config: AnthropicConfig,
    client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicOracle {
    pub fn new(config: AnthropicConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str, OracleError> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                OracleError::MissingCredentials(
                    "ANTHROPIC_API_KEY is not set; set it or pass --api-key".to_string(),
                )
            })
    }

    fn request_body(&self, request: &OracleRequest) -> serde_json::Value {
        let content: Vec<serde_json::Value> = request
            .blocks
            .iter()
            .map(|text| serde_json::json!({"type": "text", "text": text}))
            .collect();
        serde_json::json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens,
            "temperature": 0.0,
            "system": request.system,
            "messages": [{"role": "user", "content": content}],
        })
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    async fn complete(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let api_key = self.api_key()?;
        let body = self.request_body(&request);
        debug!(purpose = ?request.purpose, chars = request.char_len(), "calling oracle");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body_text = response
            .text()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;
        if status != 200 {
            return Err(parse_http_error(status, &body_text, retry_after));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body_text)
            .map_err(|e| OracleError::Parse(format!("messages response: {e}")))?;
        let text = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        Ok(OracleResponse {
            text,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }

    fn check_config(&self) -> Result<(), OracleError> {
        self.api_key().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OracleRequest {
        OracleRequest {
            purpose: Purpose::Scoring,
            system: "sys".into(),
            blocks: vec!["one".into(), "two".into()],
            max_tokens: 100,
        }
    }

    #[test]
    fn missing_key_is_config_error() {
        let oracle = AnthropicOracle::new(AnthropicConfig::default()).unwrap();
        let err = oracle.check_config().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));

        let blank = AnthropicOracle::new(AnthropicConfig {
            api_key: Some("  ".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(blank.check_config().is_err());
    }

    #[test]
    fn body_carries_blocks_in_order() {
        let oracle = AnthropicOracle::new(AnthropicConfig {
            api_key: Some("k".into()),
            ..Default::default()
        })
        .unwrap();
        let body = oracle.request_body(&request());
        assert_eq!(body["system"], "sys");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["messages"][0]["content"][1]["text"], "two");
    }

    #[test]
    fn response_parsing() {
        let json = r#"{"content": [{"type": "text", "text": "{\"items\": []}"}], "usage": {"input_tokens": 1200, "output_tokens": 300}}"#;
        let parsed: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.content[0].text.as_deref(), Some("{\"items\": []}"));
        assert_eq!(parsed.usage.input_tokens + parsed.usage.output_tokens, 1500);
    }

    #[test]
    fn token_estimate_without_usage() {
        let req = request();
        let resp = OracleResponse::text("abcd");
        assert_eq!(resp.tokens_used(&req), ((3 + 6 + 4) / 4) as u64);
        let reported = OracleResponse {
            input_tokens: 10,
            output_tokens: 5,
            ..Default::default()
        };
        assert_eq!(reported.tokens_used(&req), 15);
    }

    #[tokio::test]
    async fn complete_without_key_fails_before_network() {
        let oracle = AnthropicOracle::new(AnthropicConfig {
            endpoint: "http://127.0.0.1:9/v1/messages".into(),
            ..Default::default()
        })
        .unwrap();
        let err = oracle.complete(request()).await.unwrap_err();
        assert!(matches!(err, OracleError::MissingCredentials(_)));
    }
}
