//! Data manipulator: applies a structured instruction and returns the
//! complete next diagram data.
//!
//! The model only executes the instruction; it never sees the user's words.
//! Its output goes through the same acceptance as fresh generation, so a
//! changed diagram type or a broken invariant is caught here, not in the
//! renderer.

use super::ai::{AiContext, StructuredRequest, accept_diagram, diagram_schema_name};
use crate::diagram::registry::MANIPULATOR_PROMPT;
use crate::diagram::{DiagramData, EditInstruction};
use crate::error::PipelineError;
use crate::llm::types::ResponseSchema;

/// # Errors
///
/// `UnsupportedDiagramType` on a registry miss, `ManipulationFailed` when
/// the call fails, `InvalidManipulationResult` when the output is unusable.
pub async fn manipulate(
    ctx: &AiContext,
    current: &DiagramData,
    instruction: &EditInstruction,
) -> Result<DiagramData, PipelineError> {
    let diagram_type = current.diagram_type();
    let spec = ctx.registry.lookup(diagram_type)?;

    let data = serde_json::to_string_pretty(&current.to_value()).unwrap_or_default();
    let instruction_json = serde_json::to_string_pretty(instruction).unwrap_or_default();
    let user = format!("Current diagram data:\n```json\n{data}\n```\n\nInstruction:\n```json\n{instruction_json}\n```");

    let value = ctx
        .request(StructuredRequest {
            label: "manipulate",
            system: MANIPULATOR_PROMPT,
            user,
            schema: ResponseSchema::new(
                diagram_schema_name(diagram_type),
                format!("Emit the complete modified {diagram_type} diagram data"),
                spec.schema.clone(),
            ),
            timeout: ctx.settings.generate_timeout,
        })
        .await
        .map_err(|e| PipelineError::ManipulationFailed(e.into()))?;

    accept_diagram(value, diagram_type).map_err(|f| PipelineError::InvalidManipulationResult(f.to_string()))
}

#[cfg(test)]
#[path = "manipulator_test.rs"]
mod tests;
