//! Shared fakes for unit tests: a scripted [`LlmChat`], a scripted
//! [`DiagramModel`], and a few well-formed diagrams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use crate::diagram::{DiagramData, DiagramType, EditInstruction};
use crate::error::{ModelFailure, PipelineError};
use crate::llm::types::{ChatResponse, ContentBlock, LlmChat, LlmError, Message, ResponseSchema, StopReason};
use crate::services::model::DiagramModel;

// =============================================================================
// MockLlm
// =============================================================================

/// What a [`MockLlm`] saw for one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
    pub schema_name: Option<String>,
}

/// Replays scripted results in order; once exhausted it answers `{}`.
pub struct MockLlm {
    responses: Mutex<Vec<Result<ChatResponse, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl MockLlm {
    pub fn new(responses: Vec<Result<ChatResponse, LlmError>>) -> Self {
        Self { responses: Mutex::new(responses), calls: Mutex::new(Vec::new()), delay: None }
    }

    /// Answers every call with the given JSON documents, in order.
    pub fn with_json(values: Vec<Value>) -> Self {
        Self::new(values.into_iter().map(|v| Ok(json_response(v))).collect())
    }

    /// Sleep before answering, to exercise call timeouts.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmChat for MockLlm {
    async fn chat(
        &self,
        _max_tokens: u32,
        system: &str,
        messages: &[Message],
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatResponse, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_owned(),
            user: messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n"),
            schema_name: schema.map(|s| s.name.clone()),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(json_response(json!({})))
        } else {
            responses.remove(0)
        }
    }
}

/// A normal text answer carrying `value` as JSON.
pub fn json_response(value: Value) -> ChatResponse {
    response_with(vec![ContentBlock::Text { text: value.to_string() }], StopReason::EndTurn)
}

pub fn response_with(content: Vec<ContentBlock>, stop_reason: StopReason) -> ChatResponse {
    ChatResponse { content, model: "mock".into(), stop_reason, input_tokens: 10, output_tokens: 20 }
}

// =============================================================================
// FakeModel
// =============================================================================

/// Scripted [`DiagramModel`]. Unscripted generation types fail; an unset
/// instruction is an unresolved reference; an unset parse result fails.
#[derive(Default)]
pub struct FakeModel {
    pub classified: Option<DiagramType>,
    pub generated: HashMap<DiagramType, Result<DiagramData, String>>,
    pub instruction: Option<EditInstruction>,
    pub manipulated: Option<DiagramData>,
    pub parsed: Option<DiagramData>,
    pub generate_calls: AtomicUsize,
    pub manipulate_calls: AtomicUsize,
}

impl FakeModel {
    pub fn generates(mut self, data: DiagramData) -> Self {
        self.generated.insert(data.diagram_type(), Ok(data));
        self
    }

    pub fn fails(mut self, diagram_type: DiagramType, reason: &str) -> Self {
        self.generated.insert(diagram_type, Err(reason.to_owned()));
        self
    }
}

#[async_trait::async_trait]
impl DiagramModel for FakeModel {
    async fn classify(&self, _prompt: &str) -> Result<Option<DiagramType>, PipelineError> {
        Ok(self.classified)
    }

    async fn generate(&self, _prompt: &str, diagram_type: DiagramType) -> Result<DiagramData, PipelineError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        match self.generated.get(&diagram_type) {
            Some(Ok(data)) => Ok(data.clone()),
            Some(Err(reason)) => Err(PipelineError::GenerationFailed {
                diagram_type,
                source: ModelFailure::Llm(LlmError::MalformedOutput(reason.clone())),
            }),
            None => Err(PipelineError::GenerationFailed {
                diagram_type,
                source: ModelFailure::Llm(LlmError::Timeout { secs: 1 }),
            }),
        }
    }

    async fn interpret(&self, _edit_text: &str, _current: &DiagramData) -> Result<EditInstruction, PipelineError> {
        self.instruction
            .clone()
            .ok_or_else(|| PipelineError::UnresolvedReference("no such element".into()))
    }

    async fn manipulate(
        &self,
        current: &DiagramData,
        _instruction: &EditInstruction,
    ) -> Result<DiagramData, PipelineError> {
        self.manipulate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.manipulated.clone().unwrap_or_else(|| current.clone()))
    }

    async fn parse(&self, _code: &str, diagram_type: DiagramType) -> Result<DiagramData, PipelineError> {
        self.parsed.clone().ok_or(PipelineError::ParseFailed {
            diagram_type,
            source: ModelFailure::Llm(LlmError::MalformedOutput("not mermaid".into())),
        })
    }
}

// =============================================================================
// SAMPLE DATA
// =============================================================================

pub fn login_flowchart_value() -> Value {
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

pub fn login_flowchart() -> DiagramData {
    DiagramData::from_value(&login_flowchart_value()).unwrap()
}

pub fn ping_sequence() -> DiagramData {
    DiagramData::from_value(&json!({
        "diagramType": "Sequence",
        "title": "Ping",
        "actors": ["Client", "Server"],
        "messages": [
            { "sender": "Client", "receiver": "Server", "message": "ping", "type": "sync" },
            { "sender": "Server", "receiver": "Client", "message": "pong", "type": "reply" }
        ]
    }))
    .unwrap()
}

pub fn shop_er() -> DiagramData {
    DiagramData::from_value(&json!({
        "diagramType": "ER",
        "title": "Shop",
        "entities": [
            { "name": "User", "attributes": [{ "name": "id", "type": "int", "key": "PK" }] },
            { "name": "Order", "attributes": [{ "name": "user_id", "type": "int", "key": "FK" }] }
        ],
        "relationships": [
            { "fromEntity": "User", "toEntity": "Order", "relationshipType": "one-to-many", "label": "places" }
        ]
    }))
    .unwrap()
}
