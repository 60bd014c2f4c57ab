//! Anthropic Messages API client.
//!
//! Thin HTTP wrapper for `/v1/messages`. Structured output is obtained by
//! offering exactly one tool whose `input_schema` is the response schema and
//! forcing the model to call it. Pure parsing in `parse_response` for
//! testability.

use std::time::Duration;

use serde_json::{Value, json};

use super::config::LlmTimeouts;
use super::types::{ChatResponse, ContentBlock, LlmError, Message, ResponseSchema, StopReason};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

// =============================================================================
// CLIENT
// =============================================================================

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    request_secs: u64,
}

impl AnthropicClient {
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the TLS backend cannot be initialised.
    pub fn new(api_key: String, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, request_secs: timeouts.request_secs })
    }

    /// # Errors
    ///
    /// Transport failures, non-200 statuses and unparseable bodies.
    pub async fn chat(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatResponse, LlmError> {
        let body = build_request(model, max_tokens, system, messages, schema);

        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e, self.request_secs))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(&e, self.request_secs))?;

        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }

        parse_response(&text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(serde::Serialize)]
struct ApiTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(serde::Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(serde::Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

fn build_request<'a>(
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    schema: Option<&'a ResponseSchema>,
) -> ApiRequest<'a> {
    let tools = schema.map(|s| {
        vec![ApiTool { name: &s.name, description: &s.description, input_schema: &s.schema }]
    });
    let tool_choice = schema.map(|s| json!({ "type": "tool", "name": s.name }));
    ApiRequest { model, max_tokens, system, messages, tools, tool_choice }
}

// =============================================================================
// PARSING
// =============================================================================

fn map_stop_reason(raw: Option<&str>) -> StopReason {
    match raw {
        Some("end_turn" | "stop_sequence") => StopReason::EndTurn,
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("refusal") => StopReason::Blocked("refusal".into()),
        Some(other) => StopReason::Other(other.to_string()),
        None => StopReason::Other("none".into()),
    }
}

fn parse_response(json: &str) -> Result<ChatResponse, LlmError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let content: Vec<ContentBlock> = api
        .content
        .into_iter()
        .filter(|block| !matches!(block, ContentBlock::Unknown))
        .collect();

    Ok(ChatResponse {
        content,
        model: api.model,
        stop_reason: map_stop_reason(api.stop_reason.as_deref()),
        input_tokens: api.usage.input_tokens,
        output_tokens: api.usage.output_tokens,
    })
}

#[cfg(test)]
#[path = "anthropic_test.rs"]
mod tests;
