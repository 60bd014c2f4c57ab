use super::*;

fn timeout() -> ModelFailure {
    ModelFailure::Llm(LlmError::Timeout { secs: 60 })
}

#[test]
fn codes_are_stable() {
    assert_eq!(PipelineError::ClassificationFailed(timeout()).error_code(), "E_CLASSIFICATION_FAILED");
    assert_eq!(PipelineError::UnresolvedReference("x".into()).error_code(), "E_UNRESOLVED_REFERENCE");
    assert_eq!(
        PipelineError::ConversionFailed { diagram_type: DiagramType::Er, reason: "x".into() }.error_code(),
        "E_CONVERSION_FAILED"
    );
    assert_eq!(PipelineError::StaleVersion { requested: 1, latest: 2 }.error_code(), "E_STALE_VERSION");
}

#[test]
fn categories_separate_caller_upstream_and_internal() {
    assert_eq!(PipelineError::InvalidInput("empty".into()).category(), FailureCategory::ClientInput);
    assert_eq!(PipelineError::UnresolvedReference("x".into()).category(), FailureCategory::ClientInput);
    assert_eq!(PipelineError::AllGenerationsFailed(vec![]).category(), FailureCategory::Upstream);
    assert_eq!(PipelineError::InvalidManipulationResult("x".into()).category(), FailureCategory::Upstream);
    assert_eq!(PipelineError::UnsupportedDiagramType("Pie".into()).category(), FailureCategory::Internal);
}

#[test]
fn timeouts_are_detectable_and_retryable() {
    let err = PipelineError::GenerationFailed { diagram_type: DiagramType::Gantt, source: timeout() };
    assert!(err.timed_out());
    assert!(err.retryable());

    let blocked = PipelineError::InterpretationFailed(ModelFailure::Llm(LlmError::Blocked("SAFETY".into())));
    assert!(!blocked.timed_out());
    assert!(!blocked.retryable());
}

#[test]
fn all_generations_timed_out_only_when_every_type_did() {
    let failure = |timed_out| GenerationFailure { diagram_type: DiagramType::Flowchart, reason: "x".into(), timed_out };
    assert!(PipelineError::AllGenerationsFailed(vec![failure(true), failure(true)]).timed_out());
    assert!(!PipelineError::AllGenerationsFailed(vec![failure(true), failure(false)]).timed_out());
}

#[test]
fn unresolved_instruction_maps_to_unresolved_reference() {
    let err: PipelineError = InstructionError::UnresolvedReference("no such step".into()).into();
    assert!(matches!(err, PipelineError::UnresolvedReference(r) if r == "no such step"));

    let err: PipelineError = InstructionError::MissingNewElement.into();
    assert!(matches!(err, PipelineError::InvalidInstruction(InstructionError::MissingNewElement)));
}

#[test]
fn store_not_found_maps_to_version_not_found() {
    let id = Uuid::new_v4();
    assert!(matches!(PipelineError::from(StoreError::NotFound(id)), PipelineError::VersionNotFound(v) if v == id));
    assert!(matches!(PipelineError::from(StoreError::Corrupt("x".into())), PipelineError::Store(_)));
}

#[test]
fn render_and_data_errors_keep_their_kind() {
    let err: PipelineError = RenderError::UnsupportedDiagramType("Pie".into()).into();
    assert!(matches!(err, PipelineError::UnsupportedDiagramType(t) if t == "Pie"));

    let err: PipelineError = DataError::Malformed { diagram_type: DiagramType::Sequence, reason: "x".into() }.into();
    assert!(matches!(err, PipelineError::ConversionFailed { diagram_type: DiagramType::Sequence, .. }));
}

#[test]
fn rate_limit_is_client_input() {
    let err: PipelineError = RateLimitError::TrialExhausted { limit: 3, window_secs: 86_400 }.into();
    assert_eq!(err.category(), FailureCategory::ClientInput);
    assert_eq!(err.error_code(), "E_RATE_LIMITED");
    assert!(!err.retryable());
}
