//! Structured data → Mermaid text.
//!
//! DESIGN
//! ======
//! One pure function per diagram type, dispatched by [`render`]. No model
//! calls, no I/O: identical input always yields byte-identical output.
//!
//! All free text that lands inside flowchart node or edge syntax is quoted
//! the same way, so punctuation in labels cannot break the document.
//! Identifiers are passed through a sanitizer so reserved words and spaces
//! never reach the Mermaid grammar raw.

use std::collections::HashMap;
use std::fmt::Write;

use serde_json::Value;

use super::types::{
    Cardinality, DataError, DiagramData, DiagramType, ErDiagram, FlowElementKind, Flowchart, Gantt, MessageKind,
    Sequence, TaskStatus,
};
use super::validate::is_reserved_id;

const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("unsupported diagram type: {0}")]
    UnsupportedDiagramType(String),
    #[error("cannot convert {diagram_type} data: {reason}")]
    ConversionFailed { diagram_type: DiagramType, reason: String },
}

impl From<DataError> for RenderError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::MissingDiagramType => Self::UnsupportedDiagramType("<missing>".into()),
            DataError::UnsupportedDiagramType(t) => Self::UnsupportedDiagramType(t),
            DataError::Malformed { diagram_type, reason } => Self::ConversionFailed { diagram_type, reason },
        }
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Render typed diagram data to Mermaid.
///
/// # Errors
///
/// Returns [`RenderError::ConversionFailed`] when the data references
/// elements that do not exist.
pub fn render(data: &DiagramData) -> Result<String, RenderError> {
    match data {
        DiagramData::Flowchart(d) => render_flowchart(d),
        DiagramData::Sequence(d) => Ok(render_sequence(d)),
        DiagramData::Er(d) => Ok(render_er(d)),
        DiagramData::Gantt(d) => Ok(render_gantt(d)),
    }
}

/// Render an untyped JSON document, decoding it first.
///
/// # Errors
///
/// `UnsupportedDiagramType` for a missing or unknown `diagramType`,
/// `ConversionFailed` for a known type with the wrong shape.
pub fn render_value(value: &Value) -> Result<String, RenderError> {
    let data = DiagramData::from_value(value)?;
    render(&data)
}

// =============================================================================
// FLOWCHART
// =============================================================================

fn render_flowchart(d: &Flowchart) -> Result<String, RenderError> {
    let conversion = |reason: String| RenderError::ConversionFailed { diagram_type: DiagramType::Flowchart, reason };

    let mut node_ids: HashMap<&str, String> = HashMap::with_capacity(d.elements.len());
    let mut owners: HashMap<String, &str> = HashMap::with_capacity(d.elements.len());
    for element in &d.elements {
        let raw = element.id.trim();
        let node = node_ref(raw);
        if let Some(owner) = owners.insert(node.clone(), raw) {
            if owner != raw {
                return Err(conversion(format!("element ids '{owner}' and '{raw}' both render as node '{node}'")));
            }
        }
        node_ids.insert(raw, node);
    }
    let lookup = |endpoint: &str, from: &str, to: &str| {
        node_ids
            .get(endpoint.trim())
            .ok_or_else(|| conversion(format!("connection {from} -> {to} references unknown element '{endpoint}'")))
    };

    let mut out = String::from("graph TD\n");
    for element in &d.elements {
        let id = &node_ids[element.id.trim()];
        let text = quote(&element.text);
        let node = match element.kind {
            FlowElementKind::Start | FlowElementKind::End => format!("{id}(({text}))"),
            FlowElementKind::Decision => format!("{id}{{{text}}}"),
            FlowElementKind::InputOutput => format!("{id}[/{text}/]"),
            FlowElementKind::Subroutine => format!("{id}[[{text}]]"),
            FlowElementKind::Process | FlowElementKind::Other => format!("{id}[{text}]"),
        };
        let _ = writeln!(out, "{INDENT}{node}");
    }
    for conn in &d.connections {
        let from = lookup(&conn.from, &conn.from, &conn.to)?;
        let to = lookup(&conn.to, &conn.from, &conn.to)?;
        match conn.label.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            Some(label) => {
                let _ = writeln!(out, "{INDENT}{from} -- {} --> {to}", quote(label));
            }
            None => {
                let _ = writeln!(out, "{INDENT}{from} --> {to}");
            }
        }
    }
    Ok(out)
}

/// Node identifier as written in Mermaid: the `ident` rule, plus a `_node`
/// suffix for reserved words. Distinct ids can map to the same node, so
/// callers check for collisions.
pub(crate) fn node_ref(id: &str) -> String {
    let id = ident(id, "node");
    if is_reserved_id(&id) { format!("{id}_node") } else { id }
}

/// Double-quoted label with `"` as the Mermaid entity and line breaks as `<br/>`.
fn quote(text: &str) -> String {
    let escaped = text
        .replace('"', "#quot;")
        .replace("\r\n", "<br/>")
        .replace('\n', "<br/>");
    format!("\"{escaped}\"")
}

// =============================================================================
// SEQUENCE
// =============================================================================

/// `sync` and `async` share the solid arrow; only replies are dashed.
fn message_arrow(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Sync | MessageKind::Async => "->>",
        MessageKind::Reply => "-->",
        MessageKind::AsyncReply => "-->>",
    }
}

fn render_sequence(d: &Sequence) -> String {
    let mut out = String::from("sequenceDiagram\n");
    let title = single_line(&d.title);
    if !title.is_empty() {
        let _ = writeln!(out, "{INDENT}title {title}");
    }
    for actor in &d.actors {
        let alias = ident(actor, "actor");
        if alias == actor.trim() {
            let _ = writeln!(out, "{INDENT}participant {alias}");
        } else {
            let _ = writeln!(out, "{INDENT}participant {alias} as {}", single_line(actor));
        }
    }
    for msg in &d.messages {
        let text = single_line(&msg.message).replace(';', "#59;");
        let _ = writeln!(
            out,
            "{INDENT}{}{}{}: {text}",
            ident(&msg.sender, "actor"),
            message_arrow(msg.kind),
            ident(&msg.receiver, "actor"),
        );
    }
    out
}

// =============================================================================
// ER
// =============================================================================

/// Crow's-foot token. "Many" is written `o{` on both sides.
fn cardinality_token(c: Cardinality) -> &'static str {
    match c {
        Cardinality::OneToOne => "||--||",
        Cardinality::OneToMany => "||--o{",
        Cardinality::ManyToOne => "o{--||",
        Cardinality::ManyToMany => "o{--o{",
    }
}

fn render_er(d: &ErDiagram) -> String {
    let mut out = String::from("erDiagram\n");
    for entity in &d.entities {
        let _ = writeln!(out, "{INDENT}{} {{", ident(&entity.name, "Entity"));
        for attr in &entity.attributes {
            let _ = write!(out, "{INDENT}{INDENT}{} {}", ident(&attr.data_type, "string"), ident(&attr.name, "field"));
            if let Some(key) = attr.key {
                let _ = write!(out, " {}", key.as_str());
            }
            out.push('\n');
        }
        let _ = writeln!(out, "{INDENT}}}");
    }
    for rel in &d.relationships {
        let label = rel.label.as_deref().map(single_line).unwrap_or_default().replace('"', "'");
        let _ = writeln!(
            out,
            "{INDENT}{} {} {} : \"{label}\"",
            ident(&rel.from_entity, "Entity"),
            cardinality_token(rel.relationship_type),
            ident(&rel.to_entity, "Entity"),
        );
    }
    out
}

// =============================================================================
// GANTT
// =============================================================================

/// `pending` has no Mermaid tag; an untagged task already reads as not started.
fn status_tag(status: TaskStatus) -> Option<&'static str> {
    match status {
        TaskStatus::Active => Some("active"),
        TaskStatus::Done => Some("done"),
        TaskStatus::Crit => Some("crit"),
        TaskStatus::Pending => None,
    }
}

fn render_gantt(d: &Gantt) -> String {
    let mut out = String::from("gantt\n");
    for (keyword, value) in [
        ("title", Some(d.title.as_str())),
        ("dateFormat", Some(d.date_format.as_str())),
        ("axisFormat", d.axis_format.as_deref()),
    ] {
        let value = value.map(single_line).unwrap_or_default();
        if !value.is_empty() {
            let _ = writeln!(out, "{INDENT}{keyword} {value}");
        }
    }
    for section in &d.sections {
        let _ = writeln!(out, "{INDENT}section {}", single_line(&section.name));
        for task in &section.tasks {
            let mut fields: Vec<String> = Vec::with_capacity(4);
            if let Some(tag) = task.status.and_then(status_tag) {
                fields.push(tag.to_owned());
            }
            if let Some(id) = task.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
                fields.push(ident(id, "task"));
            }
            fields.push(single_line(&task.start));
            fields.push(single_line(&task.end));
            let name = single_line(&task.name).replace(':', "-");
            let _ = writeln!(out, "{INDENT}{name} :{}", fields.join(", "));
        }
    }
    out
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Collapse line breaks so a value cannot start a new statement.
fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mermaid-safe identifier: letters, digits, `_` and `-`; everything else `_`.
fn ident(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { fallback.to_owned() } else { cleaned }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
