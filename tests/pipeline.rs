//! End-to-end runs of the pipeline through the public API: real components
//! and renderer, an in-memory store, and a model that answers by schema.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use diagramify::config::ModelSettings;
use diagramify::diagram::{DiagramType, SchemaRegistry, StructuredData, render_value};
use diagramify::error::{ErrorCode, FailureCategory, PipelineError};
use diagramify::llm::types::{ChatResponse, ContentBlock, LlmChat, LlmError, Message, ResponseSchema, StopReason};
use diagramify::rate_limit::{InMemoryTrialLimiter, RateLimitConfig};
use diagramify::services::{DiagramService, LlmDiagramModel};
use diagramify::store::memory::MemoryStore;
use diagramify::store::{VersionOrigin, VersionStore};
use serde_json::{Value, json};
use uuid::Uuid;

// =========================================================================
// Schema-routed model
// =========================================================================

/// Answers each call from a queue keyed by the requested schema name.
#[derive(Default)]
struct RoutedLlm {
    answers: Mutex<Vec<(String, Result<String, LlmError>)>>,
}

impl RoutedLlm {
    fn answer(self, schema: &str, value: Value) -> Self {
        self.answers.lock().unwrap().push((schema.to_owned(), Ok(value.to_string())));
        self
    }

    fn answer_text(self, schema: &str, text: &str) -> Self {
        self.answers.lock().unwrap().push((schema.to_owned(), Ok(text.to_owned())));
        self
    }
}

#[async_trait::async_trait]
impl LlmChat for RoutedLlm {
    async fn chat(
        &self,
        _max_tokens: u32,
        _system: &str,
        _messages: &[Message],
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatResponse, LlmError> {
        let name = schema.map(|s| s.name.clone()).unwrap_or_default();
        let mut answers = self.answers.lock().unwrap();
        let Some(pos) = answers.iter().position(|(n, _)| *n == name) else {
            return Err(LlmError::ApiResponse { status: 500, body: format!("no answer scripted for {name}") });
        };
        let text = answers.remove(pos).1?;
        Ok(ChatResponse {
            content: vec![ContentBlock::Text { text }],
            model: "routed".into(),
            stop_reason: StopReason::EndTurn,
            input_tokens: 1,
            output_tokens: 1,
        })
    }
}

fn service(llm: RoutedLlm) -> (DiagramService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(LlmDiagramModel::new(Arc::new(llm), SchemaRegistry::builtin(), ModelSettings::default()));
    let limiter = Arc::new(InMemoryTrialLimiter::with_config(RateLimitConfig {
        per_identity_limit: 3,
        per_identity_window: Duration::from_secs(86_400),
        global_limit: 100,
        global_window: Duration::from_secs(60),
    }));
    (DiagramService::new(model, store.clone(), limiter), store)
}

fn login_flowchart() -> Value {
    json!({
        "diagramType": "Flowchart",
        "title": "Login",
        "elements": [
            { "id": "a", "type": "start", "text": "Start" },
            { "id": "b", "type": "process", "text": "Login" },
            { "id": "c", "type": "end", "text": "End" }
        ],
        "connections": [
            { "from": "a", "to": "b" },
            { "from": "b", "to": "c" }
        ]
    })
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn login_flowchart_generate_then_rename() {
    let mut renamed = login_flowchart();
    renamed["elements"][1]["text"] = json!("Sign in");
    let llm = RoutedLlm::default()
        .answer("classify_prompt", json!({ "bestType": "Flowchart", "reasoning": "a process" }))
        .answer("emit_flowchart", login_flowchart())
        .answer(
            "edit_instruction",
            json!({ "action": "update_element", "element_id": "b", "updates": { "text": "Sign in" } }),
        )
        .answer("emit_flowchart", renamed);
    let (service, store) = service(llm);
    let owner = Uuid::new_v4();

    let outcome = service.generate(owner, "user login flow", &[]).await.unwrap();
    let v1 = &outcome.versions[0];
    assert_eq!(
        v1.rendered_code,
        "graph TD\n    a((\"Start\"))\n    b[\"Login\"]\n    c((\"End\"))\n    a --> b\n    b --> c\n"
    );

    let v2 = service.reprompt(owner, v1.id, "rename Login to Sign in").await.unwrap();
    assert_eq!(v2.version_number, 2);
    assert_eq!(v2.parent_version_id, Some(v1.id));
    assert_eq!(v2.origin, VersionOrigin::Reprompt);
    assert!(v2.rendered_code.contains("    b[\"Sign in\"]\n"));

    let lineage = store.list_lineage(v1.lineage_id).await.unwrap();
    assert_eq!(lineage.iter().map(|v| v.version_number).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn hand_edited_garbage_is_saved_with_sentinel() {
    let llm = RoutedLlm::default()
        .answer("emit_flowchart", login_flowchart())
        .answer_text("emit_flowchart", "I could not understand that code.");
    let (service, _store) = service(llm);
    let owner = Uuid::new_v4();

    let v1 = service.generate(owner, "login", &[DiagramType::Flowchart]).await.unwrap().versions.remove(0);
    let outcome = service.edit_code(owner, v1.id, "graph TD\n    a -->").await.unwrap();

    assert!(!outcome.parsed);
    assert_eq!(outcome.version.version_number, 2);
    assert_eq!(outcome.version.rendered_code, "graph TD\n    a -->");
    assert!(matches!(outcome.version.structured_data, StructuredData::Unparsed(_)));
    assert_eq!(
        serde_json::to_value(&outcome.version.structured_data).unwrap(),
        json!({ "diagramType": "Flowchart", "error": "parse failed" })
    );
}

#[tokio::test]
async fn one_type_failing_keeps_the_others() {
    let llm = RoutedLlm::default()
        .answer("emit_flowchart", login_flowchart())
        .answer("emit_gantt", json!({ "diagramType": "Gantt", "sections": "soon" }));
    let (service, _store) = service(llm);

    let outcome = service
        .generate(Uuid::new_v4(), "launch plan", &[DiagramType::Flowchart, DiagramType::Gantt, DiagramType::Er])
        .await
        .unwrap();
    assert_eq!(outcome.versions.len(), 1);
    let failed: Vec<_> = outcome.failures.iter().map(|f| f.diagram_type).collect();
    assert_eq!(failed, vec![DiagramType::Gantt, DiagramType::Er]);
}

#[tokio::test]
async fn unresolved_edit_is_reported_to_caller() {
    let llm = RoutedLlm::default()
        .answer("emit_flowchart", login_flowchart())
        .answer("edit_instruction", json!({ "action": "remove_element", "error": "no payment step exists" }));
    let (service, store) = service(llm);
    let owner = Uuid::new_v4();

    let v1 = service.generate(owner, "login", &[DiagramType::Flowchart]).await.unwrap().versions.remove(0);
    let err = service.reprompt(owner, v1.id, "remove the payment step").await.unwrap_err();

    assert_eq!(err.error_code(), "E_UNRESOLVED_REFERENCE");
    assert_eq!(err.category(), FailureCategory::ClientInput);
    assert_eq!(store.list_lineage(v1.lineage_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn classifier_with_no_fit_creates_nothing() {
    let llm = RoutedLlm::default().answer("classify_prompt", json!({ "reasoning": "that is a haiku" }));
    let (service, store) = service(llm);
    let owner = Uuid::new_v4();

    let outcome = service.generate(owner, "write a haiku", &[]).await.unwrap();
    assert!(outcome.no_relevant_type);
    assert!(store.latest_per_owner(owner).await.unwrap().is_empty());
}

// =========================================================================
// Renderer on raw JSON
// =========================================================================

#[test]
fn er_user_post_renders_one_to_many() {
    let code = render_value(&json!({
        "diagramType": "ER",
        "entities": [
            { "name": "User", "attributes": [{ "name": "id", "type": "int", "key": "PK" }] },
            { "name": "Post", "attributes": [{ "name": "user_id", "type": "int", "key": "FK" }] }
        ],
        "relationships": [
            { "fromEntity": "User", "toEntity": "Post", "relationshipType": "one-to-many", "label": "writes" }
        ]
    }))
    .unwrap();
    assert_eq!(
        code,
        "erDiagram\n    User {\n        int id PK\n    }\n    Post {\n        int user_id FK\n    }\n    User ||--o{ Post : \"writes\"\n"
    );
}

#[test]
fn dangling_flowchart_reference_is_conversion_failure() {
    let mut value = login_flowchart();
    value["connections"][1]["to"] = json!("z");
    let err = PipelineError::from(render_value(&value).unwrap_err());
    assert_eq!(err.error_code(), "E_CONVERSION_FAILED");
    assert_eq!(err.category(), FailureCategory::Internal);
}

#[test]
fn unknown_diagram_type_is_unsupported() {
    let err = PipelineError::from(render_value(&json!({ "diagramType": "Pie", "slices": [] })).unwrap_err());
    assert_eq!(err.error_code(), "E_UNSUPPORTED_DIAGRAM_TYPE");
}
