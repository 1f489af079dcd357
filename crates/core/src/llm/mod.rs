//! LLM Gateway — the single point of entry for model calls in the core.
//!
//! The gateway contract is deliberately thin: `invoke(messages, operation)`
//! returns the response text plus token usage and nothing more. It does NOT
//! retry — retry-with-backoff belongs to the callers (the pipeline stages),
//! which know whether a failure is worth another attempt or a fallback.
//! `operation` is a short accounting tag carried into usage logs, never
//! interpreted.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::errors::CoreError;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct LlmReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// Uniform call contract over a language-model provider.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn invoke(&self, messages: &[ChatMessage], operation: &str)
        -> Result<LlmReply, CoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic Messages API implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Gateway backed by the Anthropic Messages API. Model and per-call timeout
/// come from `Config`; a timed-out request surfaces as a `Provider` error,
/// which the stage-level retry treats like any other transient failure.
#[derive(Clone)]
pub struct AnthropicGateway {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicGateway {
    pub fn new(config: &Config) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(|e| CoreError::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(AnthropicGateway {
            client,
            api_key: config.anthropic_api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmGateway for AnthropicGateway {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        operation: &str,
    ) -> Result<LlmReply, CoreError> {
        // Anthropic takes the system prompt out-of-band; fold any system
        // messages into one block and send the rest as the turn list.
        let system = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let turns: Vec<AnthropicMessage<'_>> = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| AnthropicMessage {
                role: match m.role {
                    ChatRole::Assistant => "assistant",
                    _ => "user",
                },
                content: &m.content,
            })
            .collect();

        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: turns,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CoreError::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "API returned {status}: {body}"
            )));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Provider(format!("malformed API response: {e}")))?;

        let text = parsed
            .content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.clone())
            .ok_or_else(|| CoreError::Provider("response had no text content".to_string()))?;

        let usage = TokenUsage {
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        };

        debug!(
            operation,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "LLM call succeeded"
        );

        Ok(LlmReply { text, usage })
    }
}
