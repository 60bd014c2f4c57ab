//! Gemini `generateContent` client.
//!
//! Structured output goes through `generationConfig.responseSchema` with a
//! JSON mime type. A response with no candidates, no parts, or a safety
//! finish reason is surfaced as an error or a blocked stop reason rather
//! than an empty success. Pure parsing in `parse_response` for testability.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::LlmTimeouts;
use super::types::{ChatResponse, ContentBlock, LlmError, Message, ResponseSchema, StopReason};

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    request_secs: u64,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the TLS backend cannot be initialised.
    pub fn new(api_key: String, base_url: String, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, base_url, request_secs: timeouts.request_secs })
    }

    /// # Errors
    ///
    /// Transport failures, non-200 statuses, unparseable bodies, blocked
    /// prompts and empty candidates.
    pub async fn chat(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let body = build_request(max_tokens, system, messages, schema);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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

        let mut parsed = parse_response(&text)?;
        if parsed.model.is_empty() {
            parsed.model = model.to_string();
        }
        Ok(parsed)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    system_instruction: ApiContent<'a>,
    contents: Vec<ApiContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct ApiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<ApiPart<'a>>,
}

#[derive(Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

/// Gemini names the assistant role `model`.
fn wire_role(role: &str) -> &str {
    if role == "assistant" { "model" } else { role }
}

fn build_request<'a>(
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    schema: Option<&'a ResponseSchema>,
) -> ApiRequest<'a> {
    let contents = messages
        .iter()
        .map(|m| ApiContent { role: Some(wire_role(&m.role)), parts: vec![ApiPart { text: &m.content }] })
        .collect();
    ApiRequest {
        system_instruction: ApiContent { role: None, parts: vec![ApiPart { text: system }] },
        contents,
        generation_config: GenerationConfig {
            max_output_tokens: max_tokens,
            response_mime_type: schema.map(|_| "application/json"),
            response_schema: schema.map(|s| &s.schema),
        },
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn map_finish_reason(raw: Option<&str>) -> StopReason {
    match raw {
        Some("STOP") | None => StopReason::EndTurn,
        Some("MAX_TOKENS") => StopReason::MaxTokens,
        Some(
            reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY"
            | "LANGUAGE"),
        ) => StopReason::Blocked(reason.to_string()),
        Some(other) => StopReason::Other(other.to_string()),
    }
}

fn parse_response(json: &str) -> Result<ChatResponse, LlmError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let Some(candidate) = api.candidates.into_iter().next() else {
        return Err(match api.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => LlmError::Blocked(reason),
            None => LlmError::EmptyResponse,
        });
    };

    let stop_reason = map_finish_reason(candidate.finish_reason.as_deref());
    let content: Vec<ContentBlock> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .map(|text| ContentBlock::Text { text })
        .collect();

    if content.is_empty() {
        return Err(match stop_reason {
            StopReason::Blocked(reason) => LlmError::Blocked(reason),
            _ => LlmError::EmptyResponse,
        });
    }

    let usage = api.usage_metadata.unwrap_or(UsageMetadata { prompt_token_count: 0, candidates_token_count: 0 });
    Ok(ChatResponse {
        content,
        model: api.model_version.unwrap_or_default(),
        stop_reason,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
