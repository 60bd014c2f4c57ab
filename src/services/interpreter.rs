//! Instruction interpreter: natural-language edit request to one
//! [`EditInstruction`], resolved against the current diagram.

use std::fmt::Write as _;

use super::ai::{AiContext, StructuredRequest};
use crate::diagram::registry::{INTERPRETER_PROMPT, interpretation_schema};
use crate::diagram::{DiagramData, EditInstruction};
use crate::error::PipelineError;
use crate::llm::types::ResponseSchema;

/// # Errors
///
/// `InvalidInput` for blank text, `InterpretationFailed` when the call
/// fails, `UnresolvedReference` when the request names something absent
/// from `current`, `InvalidInstruction` for an unusable instruction.
pub async fn interpret(ctx: &AiContext, edit_text: &str, current: &DiagramData) -> Result<EditInstruction, PipelineError> {
    let edit_text = edit_text.trim();
    if edit_text.is_empty() {
        return Err(PipelineError::InvalidInput("edit text is required".into()));
    }

    let value = ctx
        .request(StructuredRequest {
            label: "interpret",
            system: INTERPRETER_PROMPT,
            user: build_context(edit_text, current),
            schema: ResponseSchema::new(
                "edit_instruction",
                "Report one structured edit instruction",
                interpretation_schema(),
            ),
            timeout: ctx.settings.interpret_timeout,
        })
        .await
        .map_err(|e| PipelineError::InterpretationFailed(e.into()))?;

    let instruction = EditInstruction::from_value(&value)?;
    instruction.validate_against(current)?;
    Ok(instruction)
}

/// Current data, the ids an instruction may reference, and the request.
pub(crate) fn build_context(edit_text: &str, current: &DiagramData) -> String {
    let data = serde_json::to_string_pretty(&current.to_value()).unwrap_or_default();
    let mut out = format!("Diagram type: {}\n\nCurrent diagram data:\n```json\n{data}\n```\n\n", current.diagram_type());
    out.push_str("Resolvable ids:");
    let ids = current.element_ids();
    if ids.is_empty() {
        out.push_str(" (none)");
    }
    for id in ids {
        let _ = write!(out, "\n- {id}");
    }
    let _ = write!(out, "\n\n<user_input>\n{edit_text}\n</user_input>");
    out
}

#[cfg(test)]
#[path = "interpreter_test.rs"]
mod tests;
