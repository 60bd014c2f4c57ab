//! Pipeline error taxonomy.
//!
//! DESIGN
//! ======
//! Every layer has its own `thiserror` enum. They all funnel into
//! [`PipelineError`] at the service boundary, which carries a grepable code,
//! a retryable flag, and a [`FailureCategory`] so a caller can tell "fix your
//! request" from "the model misbehaved" from "we have a bug".

use uuid::Uuid;

use crate::diagram::{DataError, DiagramType, InstructionError, RenderError, Violation};
use crate::llm::types::LlmError;
use crate::rate_limit::RateLimitError;
use crate::store::StoreError;

/// Grepable code plus retry hint, implemented by every error enum.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The request itself is wrong; retrying unchanged will not help.
    ClientInput,
    /// The model or its transport failed or returned unusable content.
    Upstream,
    /// Invariant broken inside this crate.
    Internal,
}

// =============================================================================
// MODEL FAILURE
// =============================================================================

/// Why a single model-backed step produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum ModelFailure {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Invalid(#[from] Violation),
    #[error("expected {expected} data, model returned {actual}")]
    WrongType { expected: DiagramType, actual: DiagramType },
}

impl ModelFailure {
    #[must_use]
    pub fn timed_out(&self) -> bool {
        matches!(self, Self::Llm(LlmError::Timeout { .. }))
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.retryable(),
            // Model output is nondeterministic; another attempt may conform.
            Self::Data(_) | Self::Invalid(_) | Self::WrongType { .. } => true,
        }
    }
}

/// One type that did not make it out of a multi-type generation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub diagram_type: DiagramType,
    pub reason: String,
    pub timed_out: bool,
}

// =============================================================================
// PIPELINE ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("classification failed: {0}")]
    ClassificationFailed(#[source] ModelFailure),
    #[error("{diagram_type} generation failed: {source}")]
    GenerationFailed { diagram_type: DiagramType, source: ModelFailure },
    #[error("all {} diagram generations failed", .0.len())]
    AllGenerationsFailed(Vec<GenerationFailure>),
    #[error("interpretation failed: {0}")]
    InterpretationFailed(#[source] ModelFailure),
    #[error("invalid edit instruction: {0}")]
    InvalidInstruction(InstructionError),
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("manipulation failed: {0}")]
    ManipulationFailed(#[source] ModelFailure),
    #[error("invalid manipulation result: {0}")]
    InvalidManipulationResult(String),
    #[error("{diagram_type} parse failed: {source}")]
    ParseFailed { diagram_type: DiagramType, source: ModelFailure },
    #[error("unsupported diagram type: {0}")]
    UnsupportedDiagramType(String),
    #[error("cannot convert {diagram_type} data: {reason}")]
    ConversionFailed { diagram_type: DiagramType, reason: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("version not found: {0}")]
    VersionNotFound(Uuid),
    #[error("version {0} belongs to another owner")]
    Forbidden(Uuid),
    #[error("stale version: edit targets version {requested}, latest is {latest}")]
    StaleVersion { requested: i32, latest: i32 },
    #[error("version {0} has no structured data to edit")]
    NoStructuredData(Uuid),
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),
    #[error(transparent)]
    Store(StoreError),
}

impl PipelineError {
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::ClassificationFailed(_)
            | Self::GenerationFailed { .. }
            | Self::AllGenerationsFailed(_)
            | Self::InterpretationFailed(_)
            | Self::InvalidInstruction(_)
            | Self::ManipulationFailed(_)
            | Self::InvalidManipulationResult(_)
            | Self::ParseFailed { .. } => FailureCategory::Upstream,
            Self::UnresolvedReference(_)
            | Self::InvalidInput(_)
            | Self::VersionNotFound(_)
            | Self::Forbidden(_)
            | Self::StaleVersion { .. }
            | Self::NoStructuredData(_)
            | Self::RateLimited(_) => FailureCategory::ClientInput,
            Self::UnsupportedDiagramType(_) | Self::ConversionFailed { .. } | Self::Store(_) => {
                FailureCategory::Internal
            }
        }
    }

    /// True when a model call ran out of time.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        match self {
            Self::ClassificationFailed(f)
            | Self::GenerationFailed { source: f, .. }
            | Self::InterpretationFailed(f)
            | Self::ManipulationFailed(f)
            | Self::ParseFailed { source: f, .. } => f.timed_out(),
            Self::AllGenerationsFailed(failures) => failures.iter().all(|f| f.timed_out),
            _ => false,
        }
    }
}

impl ErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ClassificationFailed(_) => "E_CLASSIFICATION_FAILED",
            Self::GenerationFailed { .. } => "E_GENERATION_FAILED",
            Self::AllGenerationsFailed(_) => "E_ALL_GENERATIONS_FAILED",
            Self::InterpretationFailed(_) => "E_INTERPRETATION_FAILED",
            Self::InvalidInstruction(_) => "E_INVALID_INSTRUCTION",
            Self::UnresolvedReference(_) => "E_UNRESOLVED_REFERENCE",
            Self::ManipulationFailed(_) => "E_MANIPULATION_FAILED",
            Self::InvalidManipulationResult(_) => "E_INVALID_MANIPULATION_RESULT",
            Self::ParseFailed { .. } => "E_PARSE_FAILED",
            Self::UnsupportedDiagramType(_) => "E_UNSUPPORTED_DIAGRAM_TYPE",
            Self::ConversionFailed { .. } => "E_CONVERSION_FAILED",
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::VersionNotFound(_) => "E_VERSION_NOT_FOUND",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::StaleVersion { .. } => "E_STALE_VERSION",
            Self::NoStructuredData(_) => "E_NO_STRUCTURED_DATA",
            Self::RateLimited(_) => "E_RATE_LIMITED",
            Self::Store(_) => "E_STORE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::ClassificationFailed(f)
            | Self::GenerationFailed { source: f, .. }
            | Self::InterpretationFailed(f)
            | Self::ManipulationFailed(f)
            | Self::ParseFailed { source: f, .. } => f.retryable(),
            Self::AllGenerationsFailed(_) | Self::InvalidManipulationResult(_) | Self::StaleVersion { .. } => true,
            Self::Store(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<RenderError> for PipelineError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::UnsupportedDiagramType(t) => Self::UnsupportedDiagramType(t),
            RenderError::ConversionFailed { diagram_type, reason } => Self::ConversionFailed { diagram_type, reason },
        }
    }
}

/// Registry misses and undecodable stored data. Model output never takes
/// this path; it is wrapped in the failing step's variant instead.
impl From<DataError> for PipelineError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::MissingDiagramType => Self::UnsupportedDiagramType("<missing>".into()),
            DataError::UnsupportedDiagramType(t) => Self::UnsupportedDiagramType(t),
            DataError::Malformed { diagram_type, reason } => Self::ConversionFailed { diagram_type, reason },
        }
    }
}

impl From<InstructionError> for PipelineError {
    fn from(e: InstructionError) -> Self {
        match e {
            InstructionError::UnresolvedReference(reason) => Self::UnresolvedReference(reason),
            other => Self::InvalidInstruction(other),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::VersionNotFound(id),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
