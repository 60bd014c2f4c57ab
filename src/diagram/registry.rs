//! Schema/prompt registry: the one authoritative table every model-calling
//! component reads from.
//!
//! Schemas are plain JSON Schema (`type`, `properties`, `required`, `enum`,
//! `items`, `description`). That subset is accepted both as a Gemini
//! `responseSchema` and as an Anthropic tool `input_schema`. Optional fields
//! are expressed by leaving them out of `required`.

use std::collections::HashMap;

use serde_json::{Value, json};

use super::types::{DataError, DiagramType};

/// Everything needed to ask a model for one diagram type.
#[derive(Debug, Clone)]
pub struct DiagramSpec {
    pub schema: Value,
    pub generation_prompt: &'static str,
    pub parsing_prompt: &'static str,
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entries: HashMap<DiagramType, DiagramSpec>,
}

impl SchemaRegistry {
    /// Registry with every supported diagram type.
    #[must_use]
    pub fn builtin() -> Self {
        Self::with_types(&DiagramType::ALL)
    }

    /// Registry restricted to `types`. Lookups for anything else fail with
    /// `UnsupportedDiagramType`.
    #[must_use]
    pub fn with_types(types: &[DiagramType]) -> Self {
        let entries = types.iter().map(|&t| (t, builtin_spec(t))).collect();
        Self { entries }
    }

    /// # Errors
    ///
    /// `UnsupportedDiagramType` when the type has no entry.
    pub fn lookup(&self, diagram_type: DiagramType) -> Result<&DiagramSpec, DataError> {
        self.entries
            .get(&diagram_type)
            .ok_or_else(|| DataError::UnsupportedDiagramType(diagram_type.as_str().to_owned()))
    }

    /// Registered types in canonical order.
    #[must_use]
    pub fn types(&self) -> Vec<DiagramType> {
        DiagramType::ALL
            .into_iter()
            .filter(|t| self.entries.contains_key(t))
            .collect()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_spec(diagram_type: DiagramType) -> DiagramSpec {
    match diagram_type {
        DiagramType::Flowchart => DiagramSpec {
            schema: flowchart_schema(),
            generation_prompt: FLOWCHART_GENERATION,
            parsing_prompt: FLOWCHART_PARSING,
        },
        DiagramType::Sequence => DiagramSpec {
            schema: sequence_schema(),
            generation_prompt: SEQUENCE_GENERATION,
            parsing_prompt: SEQUENCE_PARSING,
        },
        DiagramType::Er => DiagramSpec {
            schema: er_schema(),
            generation_prompt: ER_GENERATION,
            parsing_prompt: ER_PARSING,
        },
        DiagramType::Gantt => DiagramSpec {
            schema: gantt_schema(),
            generation_prompt: GANTT_GENERATION,
            parsing_prompt: GANTT_PARSING,
        },
    }
}

// =============================================================================
// PER-TYPE SCHEMAS
// =============================================================================

fn title_property() -> Value {
    json!({ "type": "string", "description": "A short, descriptive title for the diagram" })
}

fn flowchart_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "diagramType": { "type": "string", "enum": ["Flowchart"] },
            "title": title_property(),
            "elements": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Unique node id; never start, end, graph or subgraph" },
                        "type": { "type": "string", "enum": ["start", "end", "process", "decision", "inputoutput"] },
                        "text": { "type": "string" }
                    },
                    "required": ["id", "type", "text"]
                }
            },
            "connections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "from": { "type": "string" },
                        "to": { "type": "string" },
                        "label": { "type": "string" }
                    },
                    "required": ["from", "to"]
                }
            }
        },
        "required": ["diagramType", "title", "elements", "connections"]
    })
}

fn sequence_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "diagramType": { "type": "string", "enum": ["Sequence"] },
            "title": title_property(),
            "actors": { "type": "array", "items": { "type": "string" } },
            "messages": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "sender": { "type": "string" },
                        "receiver": { "type": "string" },
                        "message": { "type": "string" },
                        "type": { "type": "string", "enum": ["sync", "async", "reply", "async_reply"] }
                    },
                    "required": ["sender", "receiver", "message", "type"]
                }
            }
        },
        "required": ["diagramType", "title", "actors", "messages"]
    })
}

fn er_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "diagramType": { "type": "string", "enum": ["ER"] },
            "title": title_property(),
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "attributes": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "type": { "type": "string" },
                                    "key": { "type": "string", "enum": ["PK", "FK"] }
                                },
                                "required": ["name", "type"]
                            }
                        }
                    },
                    "required": ["name", "attributes"]
                }
            },
            "relationships": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "fromEntity": { "type": "string" },
                        "toEntity": { "type": "string" },
                        "relationshipType": {
                            "type": "string",
                            "enum": ["one-to-one", "one-to-many", "many-to-one", "many-to-many"]
                        },
                        "label": { "type": "string" }
                    },
                    "required": ["fromEntity", "toEntity", "relationshipType"]
                }
            }
        },
        "required": ["diagramType", "title", "entities", "relationships"]
    })
}

fn gantt_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "diagramType": { "type": "string", "enum": ["Gantt"] },
            "title": title_property(),
            "dateFormat": { "type": "string", "description": "Date format string, e.g. YYYY-MM-DD" },
            "axisFormat": { "type": "string", "description": "Axis label format, e.g. %m/%d" },
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "tasks": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "start": { "type": "string", "description": "Start date, YYYY-MM-DD" },
                                    "end": { "type": "string", "description": "End date, YYYY-MM-DD" },
                                    "id": { "type": "string" },
                                    "status": { "type": "string", "enum": ["active", "done", "crit", "pending"] }
                                },
                                "required": ["name", "start", "end"]
                            }
                        }
                    },
                    "required": ["name", "tasks"]
                }
            }
        },
        "required": ["diagramType", "title", "dateFormat", "sections"]
    })
}

// =============================================================================
// PER-TYPE PROMPTS
// =============================================================================

const FLOWCHART_GENERATION: &str = "\
You generate structured JSON for a flowchart from the user's description. \
Follow the schema exactly and give the diagram a short, descriptive title. \
Never use 'start', 'end', 'graph' or 'subgraph' as a node id; use ids such as 'startNode' or 'endNode'. \
Every connection must reference ids declared in elements. Output only the JSON.";

const FLOWCHART_PARSING: &str = "\
You parse Mermaid flowchart code into JSON that follows the schema exactly.
- 'graph TD' or 'flowchart TD' is the header.
- A[\"Text\"] or A(Text) is {\"id\": \"A\", \"type\": \"process\", \"text\": \"Text\"}.
- A((Text)) is a start or end node.
- A{Text} is {\"type\": \"decision\"}.
- A[/Text/] is {\"type\": \"inputoutput\"}.
- A --> B is {\"from\": \"A\", \"to\": \"B\"}.
- A -- \"label\" --> B is {\"from\": \"A\", \"to\": \"B\", \"label\": \"label\"}.
Output only the JSON.";

const SEQUENCE_GENERATION: &str = "\
You generate structured JSON for a sequence diagram from the user's description. \
Follow the schema exactly and give the diagram a short, descriptive title. \
List every participant once in actors. Output only the JSON.";

const SEQUENCE_PARSING: &str = "\
You parse Mermaid sequence diagram code into JSON that follows the schema exactly.
- 'participant A' (or 'participant A as Name') adds an actor.
- 'title X' is {\"title\": \"X\"}.
- A->>B: msg is a message of type \"sync\".
- A-)B: msg is a message of type \"async\".
- A-->B: msg is a message of type \"reply\".
- A-->>B: msg is a message of type \"async_reply\".
Output only the JSON.";

const ER_GENERATION: &str = "\
You generate structured JSON for an entity-relationship diagram from the user's description. \
Follow the schema exactly and give the diagram a short, descriptive title. \
Entity names are unique single words. Output only the JSON.";

const ER_PARSING: &str = "\
You parse Mermaid erDiagram code into JSON that follows the schema exactly.
- 'ENTITY {' opens an entity; each line inside is 'type name [PK|FK]'.
- A ||--|| B : \"label\" is one-to-one.
- A ||--o{ B : \"label\" is one-to-many.
- A o{--|| B : \"label\" or A }o--|| B : \"label\" is many-to-one.
- A o{--o{ B : \"label\" or A }o--o{ B : \"label\" is many-to-many.
Output only the JSON.";

const GANTT_GENERATION: &str = "\
You generate structured JSON for a Gantt chart from the user's description. \
Follow the schema exactly and give the chart a short, descriptive title. \
Dates use YYYY-MM-DD and dateFormat is 'YYYY-MM-DD'. A task never ends before it starts. \
Output only the JSON.";

const GANTT_PARSING: &str = "\
You parse Mermaid gantt code into JSON that follows the schema exactly.
- 'title X', 'dateFormat F' and 'axisFormat A' map to their fields.
- 'section Name' opens a section.
- 'Task :done, t1, 2024-01-01, 2024-01-02' is {\"name\": \"Task\", \"status\": \"done\", \"id\": \"t1\", \"start\": \"2024-01-01\", \"end\": \"2024-01-02\"}.
- 'Task :2024-01-01, 2024-01-02' has no status or id.
Output only the JSON.";

// =============================================================================
// PIPELINE PROMPTS
// =============================================================================

pub const CLASSIFIER_PROMPT: &str = "\
You classify diagram requests. Pick the single best diagram type for the user's prompt:
- Flowchart: processes, logic flows, decision trees, workflows.
- Sequence: time-ordered interactions between actors, API calls, message flows.
- ER: database schemas, entities, relationships, data models.
- Gantt: project schedules, timelines, tasks with dates.
If none of these fits, omit bestType. Output only the JSON.";

#[must_use]
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "bestType": { "type": "string", "enum": ["Flowchart", "Sequence", "ER", "Gantt"] },
            "reasoning": { "type": "string", "description": "Brief reason for the choice" }
        }
    })
}

pub const INTERPRETER_PROMPT: &str = "\
You turn a natural-language edit request into one structured edit instruction.
Use the current diagram data to resolve names to element ids.
- Changing text: {\"action\": \"update_element\", \"element_id\": \"<id>\", \"updates\": {\"text\": \"<new text>\"}}
- Adding: {\"action\": \"add_element\", \"new_element\": {\"type\": \"<type>\", \"text\": \"<text>\"}, \"connections\": [{\"from\": \"<id>\", \"to\": \"<id>\", \"label\": \"<optional>\"}]}
- Removing: {\"action\": \"remove_element\", \"element_id\": \"<id>\"}
element_id must be one of the resolvable ids listed with the data. \
If the request refers to something that does not exist, set error to a short explanation instead. \
Output only the JSON.";

#[must_use]
pub fn interpretation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": { "type": "string", "enum": ["update_element", "add_element", "remove_element"] },
            "element_id": { "type": "string" },
            "updates": {
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            },
            "new_element": {
                "type": "object",
                "properties": { "type": { "type": "string" }, "text": { "type": "string" } },
                "required": ["type", "text"]
            },
            "connections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "from": { "type": "string" },
                        "to": { "type": "string" },
                        "label": { "type": "string" }
                    },
                    "required": ["from", "to"]
                }
            },
            "error": { "type": "string", "description": "Set only when the request cannot be resolved" }
        },
        "required": ["action"]
    })
}

pub const MANIPULATOR_PROMPT: &str = "\
You apply a structured edit instruction to diagram data. Do not interpret natural language. \
Return the complete modified diagram data, keeping the same diagramType and every untouched element unchanged. \
Ids stay unique; a new element gets a fresh id that is not already used. \
Output only the JSON.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_type() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.types(), DiagramType::ALL.to_vec());
        for t in DiagramType::ALL {
            let spec = registry.lookup(t).unwrap();
            assert_eq!(spec.schema["properties"]["diagramType"]["enum"][0], t.as_str());
            assert!(!spec.generation_prompt.is_empty());
            assert!(!spec.parsing_prompt.is_empty());
        }
    }

    #[test]
    fn restricted_registry_rejects_missing_type() {
        let registry = SchemaRegistry::with_types(&[DiagramType::Flowchart]);
        let err = registry.lookup(DiagramType::Gantt).unwrap_err();
        assert_eq!(err, DataError::UnsupportedDiagramType("Gantt".into()));
    }

    #[test]
    fn gantt_axis_format_is_optional() {
        let schema = SchemaRegistry::builtin().lookup(DiagramType::Gantt).unwrap().schema.clone();
        let required: Vec<&str> = schema["required"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
        assert!(schema["properties"].get("axisFormat").is_some());
        assert!(!required.contains(&"axisFormat"));
    }

    #[test]
    fn classification_best_type_is_optional() {
        assert!(classification_schema().get("required").is_none());
    }
}
