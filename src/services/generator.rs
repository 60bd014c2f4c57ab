//! Structured data generator: one schema-constrained call per diagram type.
//!
//! DESIGN
//! ======
//! `generate` produces one type. `generate_many` fans out over several types
//! through the [`DiagramModel`] seam and joins all-settled: one type failing
//! (or timing out) never discards the others.

use futures::future::join_all;
use tracing::warn;

use super::ai::{AiContext, StructuredRequest, accept_diagram, diagram_schema_name};
use super::model::DiagramModel;
use crate::diagram::{DiagramData, DiagramType};
use crate::error::{GenerationFailure, PipelineError};
use crate::llm::types::ResponseSchema;

/// # Errors
///
/// `UnsupportedDiagramType` when the registry has no entry for the type,
/// `GenerationFailed` when the call fails or its output is unusable.
pub async fn generate(ctx: &AiContext, prompt: &str, diagram_type: DiagramType) -> Result<DiagramData, PipelineError> {
    let spec = ctx.registry.lookup(diagram_type)?;

    let value = ctx
        .request(StructuredRequest {
            label: "generate",
            system: spec.generation_prompt,
            user: prompt.trim().to_owned(),
            schema: ResponseSchema::new(
                diagram_schema_name(diagram_type),
                format!("Emit {diagram_type} diagram data"),
                spec.schema.clone(),
            ),
            timeout: ctx.settings.generate_timeout,
        })
        .await
        .map_err(|e| PipelineError::GenerationFailed { diagram_type, source: e.into() })?;

    accept_diagram(value, diagram_type).map_err(|source| PipelineError::GenerationFailed { diagram_type, source })
}

/// Successes and failures of a multi-type generation, each in request order.
#[derive(Debug, Default)]
pub struct GenerationBatch {
    pub diagrams: Vec<DiagramData>,
    pub failures: Vec<GenerationFailure>,
}

/// Generate every type concurrently and collect all outcomes.
pub async fn generate_many(model: &dyn DiagramModel, prompt: &str, types: &[DiagramType]) -> GenerationBatch {
    let results = join_all(types.iter().map(|&t| async move { (t, model.generate(prompt, t).await) })).await;

    let mut batch = GenerationBatch::default();
    for (diagram_type, result) in results {
        match result {
            Ok(data) => batch.diagrams.push(data),
            Err(e) => {
                warn!(diagram_type = %diagram_type, error = %e, "generate: type failed");
                batch.failures.push(GenerationFailure {
                    diagram_type,
                    reason: e.to_string(),
                    timed_out: e.timed_out(),
                });
            }
        }
    }
    batch
}

#[cfg(test)]
#[path = "generator_test.rs"]
mod tests;
