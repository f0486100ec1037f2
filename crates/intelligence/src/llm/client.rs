//! OpenAI-compatible chat-completions backend.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

const MAX_ERROR_CHARS: usize = 200;
/// Upper bound per request; the model chain applies tighter per-attempt limits.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// One chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat-completion endpoint that answers for one model at a time.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Non-empty completion text, or an error describing why there is none.
    async fn complete(&self, model: &str, request: &ChatRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Redact bearer tokens and API keys, then truncate for logging.
pub fn redact_secrets(text: &str) -> String {
    static BEARER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)bearer\s+[\w.\-]+").expect("valid bearer regex"));
    static API_KEY: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)api[_-]?key["\s:=]+[\w.\-]+"#).expect("valid api key regex")
    });

    let redacted = BEARER.replace_all(text, "Bearer [REDACTED]");
    let redacted = API_KEY.replace_all(&redacted, "api_key=[REDACTED]");
    redacted.chars().take(MAX_ERROR_CHARS).collect()
}

/// [`ChatBackend`] for `POST {base}/chat/completions` with bearer auth.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let endpoint = Url::parse(&base)
            .and_then(|b| b.join("chat/completions"))
            .with_context(|| format!("invalid chat base url: {base_url}"))?;
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(&self, model: &str, request: &ChatRequest) -> Result<String> {
        let body = ChatBody {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt.trim(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("request to {model} failed: {}", redact_secrets(&e.to_string())))?;

        // Drain the body before looking at the status.
        let status = resp.status();
        let text = resp
            .text()
            .await
            .with_context(|| format!("reading {model} response body"))?;

        if !status.is_success() {
            bail!(
                "{model} returned {}: {}",
                status.as_u16(),
                redact_secrets(&text)
            );
        }
        if text.trim().is_empty() {
            bail!("{model} returned an empty body");
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("{model} returned invalid JSON: {e}"))?;
        if let Some(err) = parsed.error {
            let detail = err
                .message
                .or(err.kind)
                .unwrap_or_else(|| "unknown API error".to_string());
            bail!("{model} API error: {}", redact_secrets(&detail));
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("{model} returned no completion content"))
    }
}
