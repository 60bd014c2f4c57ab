//! Diagram domain: typed structured data, the schema/prompt registry, edit
//! instructions, structural validation and the deterministic Mermaid
//! renderer. Nothing in here talks to a model or a database.

pub mod instruction;
pub mod registry;
pub mod render;
pub mod types;
pub mod validate;

pub use instruction::{EditAction, EditInstruction, InstructionError};
pub use registry::{DiagramSpec, SchemaRegistry};
pub use render::{RenderError, render, render_value};
pub use types::{DataError, DiagramData, DiagramType, ParseSentinel, StructuredData};
pub use validate::{Violation, validate};
