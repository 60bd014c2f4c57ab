//! Model-call plumbing shared by the pipeline components.
//!
//! DESIGN
//! ======
//! Every component asks the model for exactly one JSON document under a
//! schema. [`AiContext::request`] owns the parts that are the same for all
//! of them: the per-class timeout, the stop-reason check, token logging,
//! and extraction of the structured output. [`accept_diagram`] owns the
//! other half: turning that JSON into checked [`DiagramData`].
//!
//! ERROR HANDLING
//! ==============
//! Anything other than a normal stop is a hard failure of the call, even if
//! some text came back. A truncated or blocked answer is never half-parsed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::ModelSettings;
use crate::diagram::types::ensure_type_tag;
use crate::diagram::{DiagramData, DiagramType, SchemaRegistry, validate};
use crate::error::ModelFailure;
use crate::llm::types::{LlmChat, LlmError, Message, ResponseSchema, StopReason};

/// Shared handles for the model-backed components.
#[derive(Clone)]
pub struct AiContext {
    pub llm: Arc<dyn LlmChat>,
    pub registry: Arc<SchemaRegistry>,
    pub settings: ModelSettings,
}

/// One schema-constrained model call.
pub struct StructuredRequest<'a> {
    pub label: &'static str,
    pub system: &'a str,
    pub user: String,
    pub schema: ResponseSchema,
    pub timeout: Duration,
}

impl AiContext {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmChat>, registry: SchemaRegistry, settings: ModelSettings) -> Self {
        Self { llm, registry: Arc::new(registry), settings }
    }

    /// Run one call and return the JSON document the model produced.
    ///
    /// # Errors
    ///
    /// `Timeout` when the budget elapses, `Blocked` or `MalformedOutput` for
    /// an abnormal stop, and whatever the transport or extraction reports.
    pub async fn request(&self, req: StructuredRequest<'_>) -> Result<Value, LlmError> {
        let messages = [Message::user(req.user)];
        let call = self.llm.chat(self.settings.max_tokens, req.system, &messages, Some(&req.schema));

        let response = match tokio::time::timeout(req.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(label = req.label, error = %e, "ai: model call failed");
                return Err(e);
            }
            Err(_) => {
                let secs = req.timeout.as_secs();
                warn!(label = req.label, timeout_secs = secs, "ai: model call timed out");
                return Err(LlmError::Timeout { secs });
            }
        };

        info!(
            label = req.label,
            model = %response.model,
            stop_reason = %response.stop_reason,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "ai: model response"
        );

        match &response.stop_reason {
            StopReason::Blocked(reason) => return Err(LlmError::Blocked(reason.clone())),
            StopReason::MaxTokens => {
                return Err(LlmError::MalformedOutput("output truncated at max tokens".into()));
            }
            StopReason::Other(reason) => {
                return Err(LlmError::MalformedOutput(format!("unexpected stop reason: {reason}")));
            }
            StopReason::EndTurn | StopReason::ToolUse => {}
        }

        response.structured_output()
    }
}

/// Schema name handed to the provider for a diagram-producing call.
#[must_use]
pub fn diagram_schema_name(diagram_type: DiagramType) -> String {
    format!("emit_{}", diagram_type.as_str().to_ascii_lowercase())
}

/// Turn model JSON into diagram data of `expected` type that passes the
/// structural invariants.
///
/// A missing `diagramType` tag is filled in with `expected`; a different tag
/// is `WrongType`.
///
/// # Errors
///
/// `Data` when the JSON does not decode, `WrongType`, or `Invalid` for the
/// first invariant violation.
pub fn accept_diagram(mut value: Value, expected: DiagramType) -> Result<DiagramData, ModelFailure> {
    ensure_type_tag(&mut value, expected);
    let data = DiagramData::from_value(&value)?;
    let actual = data.diagram_type();
    if actual != expected {
        return Err(ModelFailure::WrongType { expected, actual });
    }
    validate(&data)?;
    Ok(data)
}

#[cfg(test)]
#[path = "ai_test.rs"]
mod tests;
