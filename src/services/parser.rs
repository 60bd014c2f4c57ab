//! Code parser: hand-edited Mermaid back to structured data.
//!
//! Parsing is model-based, so it can fail for reasons unrelated to the code.
//! Callers that persist code edits recover from `ParseFailed` by storing the
//! parse sentinel; this module only reports.

use super::ai::{AiContext, StructuredRequest, accept_diagram, diagram_schema_name};
use crate::diagram::{DiagramData, DiagramType};
use crate::error::PipelineError;
use crate::llm::types::ResponseSchema;

/// # Errors
///
/// `InvalidInput` for blank code, `UnsupportedDiagramType` on a registry
/// miss, `ParseFailed` when the call fails or its output is unusable.
pub async fn parse(ctx: &AiContext, code: &str, diagram_type: DiagramType) -> Result<DiagramData, PipelineError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(PipelineError::InvalidInput("diagram code is required".into()));
    }
    let spec = ctx.registry.lookup(diagram_type)?;

    let value = ctx
        .request(StructuredRequest {
            label: "parse",
            system: spec.parsing_prompt,
            user: format!("```mermaid\n{code}\n```"),
            schema: ResponseSchema::new(
                diagram_schema_name(diagram_type),
                format!("Emit the {diagram_type} diagram data this code describes"),
                spec.schema.clone(),
            ),
            timeout: ctx.settings.generate_timeout,
        })
        .await
        .map_err(|e| PipelineError::ParseFailed { diagram_type, source: e.into() })?;

    accept_diagram(value, diagram_type).map_err(|source| PipelineError::ParseFailed { diagram_type, source })
}
