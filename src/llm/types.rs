//! LLM types: provider-neutral messages, responses and errors.
//!
//! Shared by the Gemini and Anthropic clients. Structured output is requested
//! through [`ResponseSchema`]; each provider maps it onto its own mechanism.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the LLM provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The LLM provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The LLM provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// No answer within the call's time budget.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider refused the prompt or stopped for safety reasons.
    #[error("response blocked: {0}")]
    Blocked(String),

    /// No candidates, or candidates without content.
    #[error("empty response from model")]
    EmptyResponse,

    /// Content arrived but is not the JSON that was asked for.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

impl ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingApiKey { .. } => "E_MISSING_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Timeout { .. } => "E_LLM_TIMEOUT",
            Self::Blocked(_) => "E_LLM_BLOCKED",
            Self::EmptyResponse => "E_LLM_EMPTY_RESPONSE",
            Self::MalformedOutput(_) => "E_LLM_MALFORMED_OUTPUT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ApiRequest(_)
                | Self::ApiResponse { status: 429 | 500..=599, .. }
                | Self::Timeout { .. }
                | Self::EmptyResponse
                | Self::MalformedOutput(_)
        )
    }
}

impl LlmError {
    /// Classify a transport failure; client-side timeouts become `Timeout`.
    pub(crate) fn from_transport(e: &reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            Self::Timeout { secs: timeout_secs }
        } else {
            Self::ApiRequest(e.to_string())
        }
    }
}

// =============================================================================
// CONTENT BLOCKS
// =============================================================================

/// A structured content block in an API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// A plain text segment.
    #[serde(rename = "text")]
    Text { text: String },

    /// A tool invocation emitted by the model. Forced tool calls carry the
    /// structured output in `input`.
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },

    /// Extended thinking block.
    #[serde(rename = "thinking")]
    Thinking { thinking: String },

    /// Any unrecognized block type; ignored downstream.
    #[serde(other)]
    Unknown,
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

/// JSON schema the response must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Identifier-safe name; used as the forced tool name on Anthropic.
    pub name: String,
    pub description: String,
    pub schema: Value,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self { name: name.into(), description: description.into(), schema }
    }
}

/// Why the model stopped producing output, normalized across providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Blocked(String),
    Other(String),
}

impl StopReason {
    /// Stopped on its own, with complete output.
    #[must_use]
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::EndTurn | Self::ToolUse)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndTurn => f.write_str("end_turn"),
            Self::ToolUse => f.write_str("tool_use"),
            Self::MaxTokens => f.write_str("max_tokens"),
            Self::Blocked(reason) => write!(f, "blocked:{reason}"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

/// Response from an LLM chat call.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: StopReason,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ChatResponse {
    /// Extract the JSON document the model answered with.
    ///
    /// A tool call wins over text. Text is concatenated and read as JSON,
    /// tolerating a surrounding markdown fence.
    ///
    /// # Errors
    ///
    /// `EmptyResponse` when there is neither a tool call nor text,
    /// `MalformedOutput` when the text is not JSON.
    pub fn structured_output(&self) -> Result<Value, LlmError> {
        for block in &self.content {
            if let ContentBlock::ToolUse { input, .. } = block {
                return Ok(input.clone());
            }
        }
        let text: String = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        serde_json::from_str(strip_code_fence(text)).map_err(|e| LlmError::MalformedOutput(e.to_string()))
    }
}

/// Strip a ```` ```json ... ``` ```` wrapper if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// =============================================================================
// LLM CHAT TRAIT
// =============================================================================

/// Provider-neutral async trait for LLM chat. Enables mocking in tests.
#[async_trait::async_trait]
pub trait LlmChat: Send + Sync {
    /// Send a chat request to the LLM provider.
    ///
    /// With `schema`, the provider is asked to answer with a JSON document
    /// conforming to it.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails, the response is malformed,
    /// or the API key is absent.
    async fn chat(
        &self,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatResponse, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
