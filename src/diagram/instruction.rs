//! Structured edit instructions produced by the interpreter and consumed by
//! the manipulator.
//!
//! An instruction is transient: it is checked against the diagram it was
//! derived from and then handed to the manipulator, never persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Connection, DiagramData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    UpdateElement,
    AddElement,
    RemoveElement,
}

impl EditAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "update_element" => Some(Self::UpdateElement),
            "add_element" => Some(Self::AddElement),
            "remove_element" => Some(Self::RemoveElement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementUpdate {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditInstruction {
    pub action: EditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<ElementUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_element: Option<NewElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<Connection>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstructionError {
    #[error("unknown edit action: {0}")]
    UnknownAction(String),
    #[error("malformed instruction: {0}")]
    Malformed(String),
    #[error("{0:?} requires element_id")]
    MissingElementId(EditAction),
    #[error("update_element requires updates")]
    MissingUpdates,
    #[error("add_element requires new_element")]
    MissingNewElement,
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
}

impl EditInstruction {
    /// Decode a model-produced instruction.
    ///
    /// A non-empty `error` field is the model saying it could not resolve
    /// the request; that becomes `UnresolvedReference`.
    ///
    /// # Errors
    ///
    /// `UnresolvedReference`, `UnknownAction` or `Malformed`.
    pub fn from_value(value: &Value) -> Result<Self, InstructionError> {
        if let Some(reason) = value.get("error").and_then(Value::as_str) {
            if !reason.trim().is_empty() {
                return Err(InstructionError::UnresolvedReference(reason.to_owned()));
            }
        }
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| InstructionError::Malformed("missing action".into()))?;
        if EditAction::parse(action).is_none() {
            return Err(InstructionError::UnknownAction(action.to_owned()));
        }
        serde_json::from_value(value.clone()).map_err(|e| InstructionError::Malformed(e.to_string()))
    }

    /// Check the per-action requirements and that `element_id` resolves in
    /// `current`.
    ///
    /// # Errors
    ///
    /// The first missing field, or `UnresolvedReference` for an unknown id.
    pub fn validate_against(&self, current: &DiagramData) -> Result<(), InstructionError> {
        match self.action {
            EditAction::UpdateElement => {
                self.require_resolved_id(current)?;
                if self.updates.is_none() {
                    return Err(InstructionError::MissingUpdates);
                }
            }
            EditAction::RemoveElement => self.require_resolved_id(current)?,
            EditAction::AddElement => {
                if self.new_element.is_none() {
                    return Err(InstructionError::MissingNewElement);
                }
            }
        }
        Ok(())
    }

    fn require_resolved_id(&self, current: &DiagramData) -> Result<(), InstructionError> {
        let id = self
            .element_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(InstructionError::MissingElementId(self.action))?;
        if current.has_element(id) {
            Ok(())
        } else {
            Err(InstructionError::UnresolvedReference(format!("no element '{id}' in current diagram")))
        }
    }
}

#[cfg(test)]
#[path = "instruction_test.rs"]
mod tests;
