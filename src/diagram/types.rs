//! Structured diagram data, the JSON-shaped intermediate representation.
//!
//! DESIGN
//! ======
//! `DiagramData` is internally tagged by `diagramType`, so the wire shape the
//! model produces and the shape persisted in `structured_data` are the same
//! document. Model output always enters through [`DiagramData::from_value`],
//! which separates "unknown type" from "known type, wrong shape".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// DIAGRAM TYPE
// =============================================================================

/// Closed set of supported diagram types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagramType {
    Flowchart,
    #[serde(alias = "Sequence Diagram")]
    Sequence,
    #[serde(rename = "ER", alias = "ER Diagram")]
    Er,
    #[serde(alias = "Gantt Chart")]
    Gantt,
}

impl DiagramType {
    pub const ALL: [DiagramType; 4] = [Self::Flowchart, Self::Sequence, Self::Er, Self::Gantt];

    /// Canonical wire name (`"Flowchart"`, `"Sequence"`, `"ER"`, `"Gantt"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flowchart => "Flowchart",
            Self::Sequence => "Sequence",
            Self::Er => "ER",
            Self::Gantt => "Gantt",
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Flowchart" => Ok(Self::Flowchart),
            "Sequence" | "Sequence Diagram" => Ok(Self::Sequence),
            "ER" | "ER Diagram" => Ok(Self::Er),
            "Gantt" | "Gantt Chart" => Ok(Self::Gantt),
            other => Err(DataError::UnsupportedDiagramType(other.to_owned())),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("diagram data has no diagramType")]
    MissingDiagramType,
    #[error("unsupported diagram type: {0}")]
    UnsupportedDiagramType(String),
    #[error("malformed {diagram_type} data: {reason}")]
    Malformed { diagram_type: DiagramType, reason: String },
}

// =============================================================================
// FLOWCHART
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flowchart {
    #[serde(default)]
    pub title: String,
    pub elements: Vec<FlowElement>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowElement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FlowElementKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowElementKind {
    Start,
    End,
    Process,
    Decision,
    #[serde(alias = "input_output", alias = "io")]
    InputOutput,
    Subroutine,
    /// Anything the model invents; rendered as a plain rectangle.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// =============================================================================
// SEQUENCE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(default)]
    pub title: String,
    pub actors: Vec<String>,
    pub messages: Vec<SequenceMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMessage {
    pub sender: String,
    pub receiver: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Sync,
    Async,
    Reply,
    AsyncReply,
}

// =============================================================================
// ER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErDiagram {
    #[serde(default)]
    pub title: String,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<AttributeKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKey {
    PK,
    FK,
}

impl AttributeKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PK => "PK",
            Self::FK => "FK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_entity: String,
    pub to_entity: String,
    pub relationship_type: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

// =============================================================================
// GANTT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gantt {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_format: Option<String>,
    pub sections: Vec<GanttSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GanttSection {
    pub name: String,
    pub tasks: Vec<GanttTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GanttTask {
    pub name: String,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Done,
    Crit,
    Pending,
}

// =============================================================================
// DIAGRAM DATA
// =============================================================================

/// Structured data for one diagram, tagged by `diagramType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "diagramType")]
pub enum DiagramData {
    Flowchart(Flowchart),
    #[serde(alias = "Sequence Diagram")]
    Sequence(Sequence),
    #[serde(rename = "ER", alias = "ER Diagram")]
    Er(ErDiagram),
    #[serde(alias = "Gantt Chart")]
    Gantt(Gantt),
}

impl DiagramData {
    /// Decode untrusted JSON (model output, stored documents, CLI input).
    ///
    /// # Errors
    ///
    /// `MissingDiagramType` / `UnsupportedDiagramType` when the tag is absent
    /// or unknown, `Malformed` when the tag is known but the shape is wrong.
    pub fn from_value(value: &Value) -> Result<Self, DataError> {
        let tag = value
            .get("diagramType")
            .and_then(Value::as_str)
            .ok_or(DataError::MissingDiagramType)?;
        let diagram_type: DiagramType = tag.parse()?;
        serde_json::from_value(value.clone())
            .map_err(|e| DataError::Malformed { diagram_type, reason: e.to_string() })
    }

    #[must_use]
    pub fn diagram_type(&self) -> DiagramType {
        match self {
            Self::Flowchart(_) => DiagramType::Flowchart,
            Self::Sequence(_) => DiagramType::Sequence,
            Self::Er(_) => DiagramType::Er,
            Self::Gantt(_) => DiagramType::Gantt,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Flowchart(d) => &d.title,
            Self::Sequence(d) => &d.title,
            Self::Er(d) => &d.title,
            Self::Gantt(d) => &d.title,
        }
    }

    /// Identifiers an edit instruction may reference by `element_id`.
    ///
    /// Flowchart element ids, sequence actors, ER entity names, and Gantt
    /// section names plus task ids and task names.
    #[must_use]
    pub fn element_ids(&self) -> Vec<&str> {
        match self {
            Self::Flowchart(d) => d.elements.iter().map(|e| e.id.as_str()).collect(),
            Self::Sequence(d) => d.actors.iter().map(String::as_str).collect(),
            Self::Er(d) => d.entities.iter().map(|e| e.name.as_str()).collect(),
            Self::Gantt(d) => {
                let mut ids = Vec::new();
                for section in &d.sections {
                    ids.push(section.name.as_str());
                    for task in &section.tasks {
                        if let Some(id) = &task.id {
                            ids.push(id.as_str());
                        }
                        ids.push(task.name.as_str());
                    }
                }
                ids
            }
        }
    }

    #[must_use]
    pub fn has_element(&self, id: &str) -> bool {
        self.element_ids().contains(&id)
    }

    /// Serialize to JSON. Infallible for this type: every field is a string,
    /// enum, or vector of those.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Insert `diagramType` when the model left it out. An existing tag is kept
/// so a mismatch can still be detected downstream.
pub(crate) fn ensure_type_tag(value: &mut Value, diagram_type: DiagramType) {
    if let Some(obj) = value.as_object_mut() {
        obj.entry("diagramType")
            .or_insert_with(|| Value::String(diagram_type.as_str().to_owned()));
    }
}

// =============================================================================
// PERSISTED STRUCTURED DATA
// =============================================================================

/// Marker stored when hand-edited code could not be turned back into data.
pub const PARSE_FAILED_MARKER: &str = "parse failed";

/// `{diagramType, error}` placeholder persisted in place of structured data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSentinel {
    #[serde(rename = "diagramType")]
    pub diagram_type: DiagramType,
    pub error: String,
}

impl ParseSentinel {
    #[must_use]
    pub fn parse_failed(diagram_type: DiagramType) -> Self {
        Self { diagram_type, error: PARSE_FAILED_MARKER.to_owned() }
    }
}

/// What a version carries as structured data: real data, or the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructuredData {
    Diagram(DiagramData),
    Unparsed(ParseSentinel),
}

impl StructuredData {
    #[must_use]
    pub fn diagram_type(&self) -> DiagramType {
        match self {
            Self::Diagram(d) => d.diagram_type(),
            Self::Unparsed(s) => s.diagram_type,
        }
    }

    #[must_use]
    pub fn as_diagram(&self) -> Option<&DiagramData> {
        match self {
            Self::Diagram(d) => Some(d),
            Self::Unparsed(_) => None,
        }
    }

    #[must_use]
    pub fn is_unparsed(&self) -> bool {
        matches!(self, Self::Unparsed(_))
    }
}

impl From<DiagramData> for StructuredData {
    fn from(data: DiagramData) -> Self {
        Self::Diagram(data)
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
