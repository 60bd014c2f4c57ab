//! The model seam of the pipeline.
//!
//! [`DiagramService`](super::diagram::DiagramService) only ever talks to a
//! [`DiagramModel`]. [`LlmDiagramModel`] implements it over any
//! [`LlmChat`]; tests substitute a scripted fake at either layer.

use std::sync::Arc;

use super::ai::AiContext;
use super::{classifier, generator, interpreter, manipulator, parser};
use crate::config::ModelSettings;
use crate::diagram::{DiagramData, DiagramType, EditInstruction, SchemaRegistry};
use crate::error::PipelineError;
use crate::llm::types::LlmChat;

#[async_trait::async_trait]
pub trait DiagramModel: Send + Sync {
    /// Best diagram type for the prompt, or `None` when nothing fits.
    async fn classify(&self, prompt: &str) -> Result<Option<DiagramType>, PipelineError>;

    /// Checked structured data of one type.
    async fn generate(&self, prompt: &str, diagram_type: DiagramType) -> Result<DiagramData, PipelineError>;

    /// Edit request resolved against `current`.
    async fn interpret(&self, edit_text: &str, current: &DiagramData) -> Result<EditInstruction, PipelineError>;

    /// Complete next data after applying `instruction`.
    async fn manipulate(&self, current: &DiagramData, instruction: &EditInstruction)
    -> Result<DiagramData, PipelineError>;

    /// Mermaid code back to checked structured data.
    async fn parse(&self, code: &str, diagram_type: DiagramType) -> Result<DiagramData, PipelineError>;
}

pub struct LlmDiagramModel {
    ctx: AiContext,
}

impl LlmDiagramModel {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmChat>, registry: SchemaRegistry, settings: ModelSettings) -> Self {
        Self { ctx: AiContext::new(llm, registry, settings) }
    }
}

#[async_trait::async_trait]
impl DiagramModel for LlmDiagramModel {
    async fn classify(&self, prompt: &str) -> Result<Option<DiagramType>, PipelineError> {
        classifier::classify(&self.ctx, prompt).await
    }

    async fn generate(&self, prompt: &str, diagram_type: DiagramType) -> Result<DiagramData, PipelineError> {
        generator::generate(&self.ctx, prompt, diagram_type).await
    }

    async fn interpret(&self, edit_text: &str, current: &DiagramData) -> Result<EditInstruction, PipelineError> {
        interpreter::interpret(&self.ctx, edit_text, current).await
    }

    async fn manipulate(
        &self,
        current: &DiagramData,
        instruction: &EditInstruction,
    ) -> Result<DiagramData, PipelineError> {
        manipulator::manipulate(&self.ctx, current, instruction).await
    }

    async fn parse(&self, code: &str, diagram_type: DiagramType) -> Result<DiagramData, PipelineError> {
        parser::parse(&self.ctx, code, diagram_type).await
    }
}
