//! Structural invariants checked on every model-produced diagram before it is
//! rendered or persisted.

use std::collections::{HashMap, HashSet};

use time::Date;
use time::macros::format_description;

use super::render::node_ref;
use super::types::{DiagramData, ErDiagram, Flowchart, Gantt, Sequence};

/// Node ids Mermaid reads as keywords inside a flowchart.
pub const RESERVED_IDS: [&str; 4] = ["start", "end", "graph", "subgraph"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("element id must not be empty")]
    EmptyId,
    #[error("duplicate element id: {0}")]
    DuplicateId(String),
    #[error("element id '{0}' is a reserved keyword")]
    ReservedId(String),
    #[error("element ids '{first}' and '{second}' render as the same node")]
    IdCollision { first: String, second: String },
    #[error("connection {from} -> {to} references unknown element '{missing}'")]
    DanglingConnection { from: String, to: String, missing: String },
    #[error("duplicate actor: {0}")]
    DuplicateActor(String),
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("relationship {from} -> {to} references unknown entity '{missing}'")]
    UnknownEntity { from: String, to: String, missing: String },
    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),
    #[error("task '{task}' ends ({end}) before it starts ({start})")]
    TaskEndsBeforeStart { task: String, start: String, end: String },
}

#[must_use]
pub fn is_reserved_id(id: &str) -> bool {
    RESERVED_IDS.iter().any(|r| r.eq_ignore_ascii_case(id))
}

/// Check all invariants for the diagram's type. Returns the first violation.
///
/// # Errors
///
/// Returns the first [`Violation`] found, in document order.
pub fn validate(data: &DiagramData) -> Result<(), Violation> {
    match data {
        DiagramData::Flowchart(d) => validate_flowchart(d),
        DiagramData::Sequence(d) => validate_sequence(d),
        DiagramData::Er(d) => validate_er(d),
        DiagramData::Gantt(d) => validate_gantt(d),
    }
}

fn validate_flowchart(d: &Flowchart) -> Result<(), Violation> {
    let mut seen = HashSet::new();
    let mut nodes: HashMap<String, &str> = HashMap::new();
    for element in &d.elements {
        let id = element.id.trim();
        if id.is_empty() {
            return Err(Violation::EmptyId);
        }
        if is_reserved_id(id) {
            return Err(Violation::ReservedId(id.to_owned()));
        }
        if !seen.insert(id) {
            return Err(Violation::DuplicateId(id.to_owned()));
        }
        if let Some(first) = nodes.insert(node_ref(id), id) {
            return Err(Violation::IdCollision { first: first.to_owned(), second: id.to_owned() });
        }
    }
    for conn in &d.connections {
        for endpoint in [&conn.from, &conn.to] {
            if !seen.contains(endpoint.trim()) {
                return Err(Violation::DanglingConnection {
                    from: conn.from.clone(),
                    to: conn.to.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
    }
    Ok(())
}

// Undeclared senders/receivers are allowed; Mermaid declares them implicitly.
fn validate_sequence(d: &Sequence) -> Result<(), Violation> {
    let mut seen = HashSet::new();
    for actor in &d.actors {
        if !seen.insert(actor.as_str()) {
            return Err(Violation::DuplicateActor(actor.clone()));
        }
    }
    Ok(())
}

fn validate_er(d: &ErDiagram) -> Result<(), Violation> {
    let mut seen = HashSet::new();
    for entity in &d.entities {
        if !seen.insert(entity.name.trim()) {
            return Err(Violation::DuplicateEntity(entity.name.clone()));
        }
    }
    for rel in &d.relationships {
        for endpoint in [&rel.from_entity, &rel.to_entity] {
            if !seen.contains(endpoint.trim()) {
                return Err(Violation::UnknownEntity {
                    from: rel.from_entity.clone(),
                    to: rel.to_entity.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_gantt(d: &Gantt) -> Result<(), Violation> {
    let mut ids = HashSet::new();
    for task in d.sections.iter().flat_map(|s| &s.tasks) {
        if let Some(id) = &task.id {
            if !ids.insert(id.as_str()) {
                return Err(Violation::DuplicateTaskId(id.clone()));
            }
        }
        if let (Some(start), Some(end)) = (parse_iso_date(&task.start), parse_iso_date(&task.end)) {
            if end < start {
                return Err(Violation::TaskEndsBeforeStart {
                    task: task.name.clone(),
                    start: task.start.clone(),
                    end: task.end.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Dates outside `YYYY-MM-DD` (durations, `after x`) are not compared.
fn parse_iso_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
