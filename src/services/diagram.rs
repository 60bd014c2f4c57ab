//! Diagram service: the pipeline orchestrator.
//!
//! DESIGN
//! ======
//! Three entry points produce versions:
//! - `generate`: classify (unless types are given), generate all-settled,
//!   render, persist one fresh lineage per diagram.
//! - `reprompt`: interpret, manipulate, render, persist a successor.
//! - `edit_code`: parse the hand-edited code and persist it as a successor;
//!   a parse failure stores the sentinel instead of failing the save.
//!
//! `preview` runs the generate path for anonymous callers, gated by a
//! [`TrialLimiter`], and persists nothing.
//!
//! CONCURRENCY
//! ===========
//! Successor writes on one lineage are serialized by a per-lineage async
//! mutex, and an edit must target the lineage's latest version. The store's
//! unique `(lineage_id, version_number)` catches anything that slips past
//! both (another process, for instance). A lineage's mutex lives in the map
//! only while someone holds or waits on it.
//!
//! Saves of freshly generated diagrams are joined all-settled, like the
//! generation itself. The generated-diagram index and the conversation log
//! are best-effort: their failures are logged and never undo a created
//! version.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use super::generator::generate_many;
use super::model::DiagramModel;
use crate::diagram::{DiagramData, DiagramType, ParseSentinel, StructuredData, render};
use crate::error::{GenerationFailure, PipelineError};
use crate::rate_limit::TrialLimiter;
use crate::store::{ChatEntry, ChatRole, DiagramVersion, NewVersion, VersionOrigin, VersionStore};

// =============================================================================
// OUTCOMES
// =============================================================================

#[derive(Debug, Default)]
pub struct GenerateOutcome {
    /// One fresh lineage per successfully generated diagram.
    pub versions: Vec<DiagramVersion>,
    /// Types that failed while others succeeded.
    pub failures: Vec<GenerationFailure>,
    /// The classifier found no suitable type; nothing was generated.
    pub no_relevant_type: bool,
}

/// A rendered diagram that was not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewDiagram {
    pub diagram_type: DiagramType,
    pub title: String,
    pub structured_data: DiagramData,
    pub rendered_code: String,
}

#[derive(Debug, Default)]
pub struct PreviewOutcome {
    pub diagrams: Vec<PreviewDiagram>,
    pub failures: Vec<GenerationFailure>,
    pub no_relevant_type: bool,
    pub remaining_trials: usize,
}

#[derive(Debug)]
pub struct CodeEditOutcome {
    pub version: DiagramVersion,
    /// False when the code could not be parsed and the sentinel was stored.
    pub parsed: bool,
}

// =============================================================================
// SERVICE
// =============================================================================

type LineageLocks = Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>;

pub struct DiagramService {
    model: Arc<dyn DiagramModel>,
    store: Arc<dyn VersionStore>,
    limiter: Arc<dyn TrialLimiter>,
    lineage_locks: LineageLocks,
}

impl DiagramService {
    #[must_use]
    pub fn new(model: Arc<dyn DiagramModel>, store: Arc<dyn VersionStore>, limiter: Arc<dyn TrialLimiter>) -> Self {
        Self { model, store, limiter, lineage_locks: Mutex::new(HashMap::new()) }
    }

    // -------------------------------------------------------------------------
    // Generate
    // -------------------------------------------------------------------------

    /// Generate and persist diagrams for `prompt`.
    ///
    /// With an empty `types` the classifier picks the type; otherwise every
    /// listed type is generated.
    ///
    /// A diagram whose save fails is reported in `failures` next to the
    /// types that failed to generate.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank prompt, `ClassificationFailed`,
    /// `AllGenerationsFailed` when no type succeeded, and the store failure
    /// when no version could be saved at all.
    pub async fn generate(
        &self,
        owner_id: Uuid,
        prompt: &str,
        types: &[DiagramType],
    ) -> Result<GenerateOutcome, PipelineError> {
        let prompt = require_text(prompt, "prompt text is required")?;
        let Some(types) = self.resolve_types(prompt, types).await? else {
            info!(%owner_id, "generate: no relevant diagram type");
            return Ok(GenerateOutcome { no_relevant_type: true, ..GenerateOutcome::default() });
        };

        let (rendered, mut failures) = self.generate_rendered(prompt, &types).await?;

        let saves = rendered.into_iter().map(|(data, code)| {
            let diagram_type = data.diagram_type();
            let title = match data.title().trim() {
                "" => format!("Untitled {diagram_type}"),
                t => t.to_owned(),
            };
            let save = self
                .store
                .create_version(NewVersion::root(owner_id, Some(prompt.to_owned()), data.into(), code, title));
            async move { (diagram_type, save.await) }
        });

        let mut versions = Vec::new();
        let mut first_save_error = None;
        for (diagram_type, saved) in join_all(saves).await {
            match saved {
                Ok(version) => versions.push(version),
                Err(e) => {
                    warn!(%owner_id, %diagram_type, error = %e, "generate: save failed");
                    failures.push(GenerationFailure {
                        diagram_type,
                        reason: format!("save failed: {e}"),
                        timed_out: false,
                    });
                    if first_save_error.is_none() {
                        first_save_error = Some(e);
                    }
                }
            }
        }
        if versions.is_empty() {
            if let Some(e) = first_save_error {
                return Err(e.into());
            }
        }

        for version in &versions {
            let note = format!(
                "I've created a {} diagram for you! Feel free to ask me to make any changes or adjustments you'd like.",
                version.diagram_type
            );
            self.log_exchange(version, prompt, &note).await;
        }

        let ids: Vec<Uuid> = versions.iter().map(|v| v.id).collect();
        if let Err(e) = self.store.record_generated(owner_id, &ids).await {
            warn!(%owner_id, error = %e, "generate: index update failed");
        }

        info!(%owner_id, created = versions.len(), failed = failures.len(), "generate: done");
        Ok(GenerateOutcome { versions, failures, no_relevant_type: false })
    }

    /// Classify, generate and render for an anonymous caller. Consumes one
    /// trial of `identity`; nothing is persisted.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `RateLimited` when the trial allowance is spent,
    /// `ClassificationFailed`, or `AllGenerationsFailed`.
    pub async fn preview(&self, identity: &str, prompt: &str) -> Result<PreviewOutcome, PipelineError> {
        let prompt = require_text(prompt, "prompt text is required")?;
        self.limiter.check_and_record(identity)?;
        let remaining_trials = self.limiter.remaining(identity);

        let Some(types) = self.resolve_types(prompt, &[]).await? else {
            return Ok(PreviewOutcome { no_relevant_type: true, remaining_trials, ..PreviewOutcome::default() });
        };

        let (rendered, failures) = self.generate_rendered(prompt, &types).await?;
        let diagrams = rendered
            .into_iter()
            .map(|(data, rendered_code)| PreviewDiagram {
                diagram_type: data.diagram_type(),
                title: data.title().to_owned(),
                structured_data: data,
                rendered_code,
            })
            .collect();

        Ok(PreviewOutcome { diagrams, failures, no_relevant_type: false, remaining_trials })
    }

    async fn resolve_types(
        &self,
        prompt: &str,
        explicit: &[DiagramType],
    ) -> Result<Option<Vec<DiagramType>>, PipelineError> {
        if !explicit.is_empty() {
            let mut types = Vec::with_capacity(explicit.len());
            for &t in explicit {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
            return Ok(Some(types));
        }
        Ok(self.model.classify(prompt).await?.map(|t| vec![t]))
    }

    /// Generate all-settled, then render the successes. A render failure
    /// counts as a failure of that type.
    async fn generate_rendered(
        &self,
        prompt: &str,
        types: &[DiagramType],
    ) -> Result<(Vec<(DiagramData, String)>, Vec<GenerationFailure>), PipelineError> {
        let batch = generate_many(self.model.as_ref(), prompt, types).await;
        let mut failures = batch.failures;
        let mut rendered = Vec::with_capacity(batch.diagrams.len());
        for data in batch.diagrams {
            match render(&data) {
                Ok(code) => rendered.push((data, code)),
                Err(e) => {
                    warn!(diagram_type = %data.diagram_type(), error = %e, "generate: render failed");
                    failures.push(GenerationFailure {
                        diagram_type: data.diagram_type(),
                        reason: e.to_string(),
                        timed_out: false,
                    });
                }
            }
        }
        if rendered.is_empty() {
            return Err(PipelineError::AllGenerationsFailed(failures));
        }
        Ok((rendered, failures))
    }

    // -------------------------------------------------------------------------
    // Edit
    // -------------------------------------------------------------------------

    /// Apply a natural-language edit to the latest version of a lineage.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `VersionNotFound`, `Forbidden`, `StaleVersion`,
    /// `NoStructuredData` for a version holding the parse sentinel, and any
    /// interpretation, manipulation or render failure.
    pub async fn reprompt(&self, owner_id: Uuid, version_id: Uuid, edit_text: &str) -> Result<DiagramVersion, PipelineError> {
        let edit_text = require_text(edit_text, "edit text is required")?;
        let current = self.owned_version(owner_id, version_id).await?;

        let _lease = self.lock_lineage(current.lineage_id).await;
        self.ensure_latest(&current).await?;

        let data = current.structured_data.as_diagram().ok_or(PipelineError::NoStructuredData(current.id))?;
        let instruction = self.model.interpret(edit_text, data).await?;
        let next = self.model.manipulate(data, &instruction).await?;
        let code = render(&next)?;

        let version = self
            .store
            .create_version(NewVersion::successor(
                &current,
                VersionOrigin::Reprompt,
                Some(edit_text.to_owned()),
                next.into(),
                code,
            ))
            .await?;

        info!(lineage_id = %version.lineage_id, version = version.version_number, "reprompt: saved");
        self.log_exchange(&version, edit_text, &format!("Updated to version {}", version.version_number))
            .await;
        if let Err(e) = self.store.record_generated(owner_id, &[version.id]).await {
            warn!(%owner_id, version_id = %version.id, error = %e, "reprompt: index update failed");
        }
        Ok(version)
    }

    /// Save hand-edited Mermaid code as the next version.
    ///
    /// The code is stored verbatim. When it cannot be parsed back into data
    /// the version carries the parse sentinel and the save still succeeds.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `VersionNotFound`, `Forbidden`, `StaleVersion`, and
    /// store failures.
    pub async fn edit_code(&self, owner_id: Uuid, version_id: Uuid, code: &str) -> Result<CodeEditOutcome, PipelineError> {
        if code.trim().is_empty() {
            return Err(PipelineError::InvalidInput("diagram code is required".into()));
        }
        let current = self.owned_version(owner_id, version_id).await?;

        let _lease = self.lock_lineage(current.lineage_id).await;
        self.ensure_latest(&current).await?;

        let diagram_type = current.diagram_type;
        let structured: StructuredData = match self.model.parse(code, diagram_type).await {
            Ok(data) => data.into(),
            Err(e) => {
                warn!(version_id = %current.id, diagram_type = %diagram_type, error = %e, "edit_code: parse failed, storing sentinel");
                StructuredData::Unparsed(ParseSentinel::parse_failed(diagram_type))
            }
        };
        let parsed = !structured.is_unparsed();

        let version = self
            .store
            .create_version(NewVersion::successor(
                &current,
                VersionOrigin::CodeEdit,
                None,
                structured,
                code.to_owned(),
            ))
            .await?;

        let note = format!("Code updated to version {}", version.version_number);
        if let Err(e) = self
            .store
            .append_chat(ChatEntry::new(version.lineage_id, ChatRole::Assistant, note, Some(version.id)))
            .await
        {
            warn!(lineage_id = %version.lineage_id, error = %e, "edit_code: chat log append failed");
        }
        Ok(CodeEditOutcome { version, parsed })
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// `VersionNotFound` or `Forbidden`.
    pub async fn get_version(&self, owner_id: Uuid, version_id: Uuid) -> Result<DiagramVersion, PipelineError> {
        self.owned_version(owner_id, version_id).await
    }

    /// Every version of a lineage, oldest first.
    ///
    /// # Errors
    ///
    /// `VersionNotFound` for an unknown lineage, `Forbidden`.
    pub async fn history(&self, owner_id: Uuid, lineage_id: Uuid) -> Result<Vec<DiagramVersion>, PipelineError> {
        let versions = self.store.list_lineage(lineage_id).await?;
        match versions.first() {
            None => Err(PipelineError::VersionNotFound(lineage_id)),
            Some(v) if v.owner_id != owner_id => Err(PipelineError::Forbidden(lineage_id)),
            Some(_) => Ok(versions),
        }
    }

    /// Latest version of each of the owner's lineages, newest first.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn latest_versions(&self, owner_id: Uuid) -> Result<Vec<DiagramVersion>, PipelineError> {
        Ok(self.store.latest_per_owner(owner_id).await?)
    }

    /// # Errors
    ///
    /// `VersionNotFound` for an unknown lineage, `Forbidden`.
    pub async fn chat_history(&self, owner_id: Uuid, lineage_id: Uuid) -> Result<Vec<ChatEntry>, PipelineError> {
        self.owned_lineage(owner_id, lineage_id).await?;
        Ok(self.store.chat_history(lineage_id).await?)
    }

    /// Remove a whole lineage. Returns the number of versions removed.
    ///
    /// # Errors
    ///
    /// `VersionNotFound` for an unknown lineage, `Forbidden`.
    pub async fn delete_lineage(&self, owner_id: Uuid, lineage_id: Uuid) -> Result<u64, PipelineError> {
        self.owned_lineage(owner_id, lineage_id).await?;
        let removed = {
            let _lease = self.lock_lineage(lineage_id).await;
            self.store.delete_lineage(lineage_id).await?
        };
        info!(%lineage_id, removed, "delete: lineage removed");
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn owned_version(&self, owner_id: Uuid, version_id: Uuid) -> Result<DiagramVersion, PipelineError> {
        let version = self.store.get_version(version_id).await?;
        if version.owner_id != owner_id {
            return Err(PipelineError::Forbidden(version_id));
        }
        Ok(version)
    }

    async fn owned_lineage(&self, owner_id: Uuid, lineage_id: Uuid) -> Result<DiagramVersion, PipelineError> {
        let latest = self.store.latest_in_lineage(lineage_id).await?;
        if latest.owner_id != owner_id {
            return Err(PipelineError::Forbidden(lineage_id));
        }
        Ok(latest)
    }

    async fn ensure_latest(&self, current: &DiagramVersion) -> Result<(), PipelineError> {
        let latest = self.store.latest_in_lineage(current.lineage_id).await?;
        if latest.id != current.id {
            return Err(PipelineError::StaleVersion {
                requested: current.version_number,
                latest: latest.version_number,
            });
        }
        Ok(())
    }

    async fn lock_lineage(&self, lineage_id: Uuid) -> LineageLease<'_> {
        let lock = {
            let mut locks = self.lineage_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(lineage_id).or_default())
        };
        LineageLease { locks: &self.lineage_locks, lineage_id, guard: Some(lock.lock_owned().await) }
    }

    async fn log_exchange(&self, version: &DiagramVersion, user_text: &str, reply: &str) {
        let entries = [
            ChatEntry::new(version.lineage_id, ChatRole::User, user_text, None),
            ChatEntry::new(version.lineage_id, ChatRole::Assistant, reply, Some(version.id)),
        ];
        for entry in entries {
            if let Err(e) = self.store.append_chat(entry).await {
                warn!(lineage_id = %version.lineage_id, error = %e, "chat log append failed");
                return;
            }
        }
    }
}

/// Holds one lineage's mutex. On drop the map entry is removed once nobody
/// else holds or waits on it.
struct LineageLease<'a> {
    locks: &'a LineageLocks,
    lineage_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LineageLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());
        if locks.get(&self.lineage_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.lineage_id);
        }
    }
}

fn require_text<'a>(text: &'a str, what: &str) -> Result<&'a str, PipelineError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::InvalidInput(what.to_owned()));
    }
    Ok(text)
}

#[cfg(test)]
#[path = "diagram_test.rs"]
mod tests;
