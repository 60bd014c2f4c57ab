//! Type classifier: picks the single best diagram type for a prompt.
//!
//! "No type fits" is an answer, not a failure: the model omits `bestType`
//! and the caller gets `Ok(None)`.

use serde_json::Value;

use super::ai::{AiContext, StructuredRequest};
use crate::diagram::DiagramType;
use crate::diagram::registry::{CLASSIFIER_PROMPT, classification_schema};
use crate::error::{ModelFailure, PipelineError};
use crate::llm::types::{LlmError, ResponseSchema};

/// # Errors
///
/// `InvalidInput` for a blank prompt, `ClassificationFailed` when the call
/// fails or names a type that does not exist.
pub async fn classify(ctx: &AiContext, prompt: &str) -> Result<Option<DiagramType>, PipelineError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PipelineError::InvalidInput("prompt text is required".into()));
    }

    let value = ctx
        .request(StructuredRequest {
            label: "classify",
            system: CLASSIFIER_PROMPT,
            user: prompt.to_owned(),
            schema: ResponseSchema::new(
                "classify_prompt",
                "Report the diagram type that best fits the request",
                classification_schema(),
            ),
            timeout: ctx.settings.classify_timeout,
        })
        .await
        .map_err(|e| PipelineError::ClassificationFailed(e.into()))?;

    read_best_type(&value).map_err(PipelineError::ClassificationFailed)
}

/// Missing, null, blank or `"none"` all mean no type fits.
fn read_best_type(value: &Value) -> Result<Option<DiagramType>, ModelFailure> {
    match value.get("bestType") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) => {
            let name = name.trim();
            if name.is_empty() || name.eq_ignore_ascii_case("none") {
                Ok(None)
            } else {
                Ok(Some(name.parse()?))
            }
        }
        Some(other) => Err(LlmError::MalformedOutput(format!("bestType must be a string, got {other}")).into()),
    }
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;
