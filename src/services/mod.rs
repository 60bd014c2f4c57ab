//! Pipeline services.
//!
//! ARCHITECTURE
//! ============
//! The component modules (`classifier`, `generator`, `interpreter`,
//! `manipulator`, `parser`) each own one model-backed step and share the
//! call plumbing in `ai`. `model` bundles them behind the [`DiagramModel`]
//! seam, and `diagram` orchestrates steps, rendering and persistence.

pub mod ai;
pub mod classifier;
pub mod diagram;
pub mod generator;
pub mod interpreter;
pub mod manipulator;
pub mod model;
pub mod parser;

pub use diagram::{CodeEditOutcome, DiagramService, GenerateOutcome, PreviewDiagram, PreviewOutcome};
pub use model::{DiagramModel, LlmDiagramModel};
