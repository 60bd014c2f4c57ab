//! Version store: persistence boundary for diagram versions, the per-lineage
//! conversation log, and the per-owner generated-diagram index.
//!
//! DESIGN
//! ======
//! Versions are immutable rows. An edit never updates a row; it inserts a new
//! one with `version_number = prior + 1`. `(lineage_id, version_number)` is
//! unique, and a second writer racing on the same number gets
//! `VersionConflict` instead of silently forking the lineage.
//!
//! Two implementations: [`memory::MemoryStore`] for tests and database-less
//! runs, and [`postgres::PgStore`] over sqlx.

pub mod memory;
pub mod postgres;

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diagram::{DiagramType, StructuredData};
use crate::error::ErrorCode;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Uuid),
    #[error("version {version_number} already exists in lineage {lineage_id}")]
    VersionConflict { lineage_id: Uuid, version_number: i32 },
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::VersionConflict { .. } => "E_VERSION_CONFLICT",
            Self::Corrupt(_) => "E_CORRUPT_ROW",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::VersionConflict { .. } | Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)))
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// How a version came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    Generate,
    Reprompt,
    CodeEdit,
}

impl VersionOrigin {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Reprompt => "reprompt",
            Self::CodeEdit => "code_edit",
        }
    }
}

impl FromStr for VersionOrigin {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(Self::Generate),
            "reprompt" => Ok(Self::Reprompt),
            "code_edit" => Ok(Self::CodeEdit),
            other => Err(StoreError::Corrupt(format!("unknown version origin '{other}'"))),
        }
    }
}

/// One immutable snapshot of a diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramVersion {
    pub id: Uuid,
    pub lineage_id: Uuid,
    pub owner_id: Uuid,
    pub diagram_type: DiagramType,
    pub prompt_text: Option<String>,
    pub structured_data: StructuredData,
    pub rendered_code: String,
    pub parent_version_id: Option<Uuid>,
    pub version_number: i32,
    pub origin: VersionOrigin,
    pub title: String,
    pub created_at: i64,
}

/// Insert payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub lineage_id: Uuid,
    pub owner_id: Uuid,
    pub diagram_type: DiagramType,
    pub prompt_text: Option<String>,
    pub structured_data: StructuredData,
    pub rendered_code: String,
    pub parent_version_id: Option<Uuid>,
    pub version_number: i32,
    pub origin: VersionOrigin,
    pub title: String,
}

impl NewVersion {
    /// First version of a fresh lineage.
    #[must_use]
    pub fn root(
        owner_id: Uuid,
        prompt_text: Option<String>,
        structured_data: StructuredData,
        rendered_code: String,
        title: String,
    ) -> Self {
        Self {
            lineage_id: Uuid::new_v4(),
            owner_id,
            diagram_type: structured_data.diagram_type(),
            prompt_text,
            structured_data,
            rendered_code,
            parent_version_id: None,
            version_number: 1,
            origin: VersionOrigin::Generate,
            title,
        }
    }

    /// Successor of `prior` in the same lineage.
    #[must_use]
    pub fn successor(
        prior: &DiagramVersion,
        origin: VersionOrigin,
        prompt_text: Option<String>,
        structured_data: StructuredData,
        rendered_code: String,
    ) -> Self {
        let title = structured_data
            .as_diagram()
            .map(|d| d.title().trim().to_owned())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| prior.title.clone());
        Self {
            lineage_id: prior.lineage_id,
            owner_id: prior.owner_id,
            diagram_type: prior.diagram_type,
            prompt_text,
            structured_data,
            rendered_code,
            parent_version_id: Some(prior.id),
            version_number: prior.version_number + 1,
            origin,
            title,
        }
    }

    fn into_version(self, id: Uuid, created_at: i64) -> DiagramVersion {
        DiagramVersion {
            id,
            lineage_id: self.lineage_id,
            owner_id: self.owner_id,
            diagram_type: self.diagram_type,
            prompt_text: self.prompt_text,
            structured_data: self.structured_data,
            rendered_code: self.rendered_code,
            parent_version_id: self.parent_version_id,
            version_number: self.version_number,
            origin: self.origin,
            title: self.title,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(StoreError::Corrupt(format!("unknown chat role '{other}'"))),
        }
    }
}

/// One line of a lineage's conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub id: Uuid,
    pub lineage_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub resulting_version_id: Option<Uuid>,
    pub created_at: i64,
}

impl ChatEntry {
    #[must_use]
    pub fn new(lineage_id: Uuid, role: ChatRole, content: impl Into<String>, resulting_version_id: Option<Uuid>) -> Self {
        Self { id: Uuid::new_v4(), lineage_id, role, content: content.into(), resulting_version_id, created_at: now_ms() }
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait VersionStore: Send + Sync {
    /// Insert a new immutable version.
    ///
    /// # Errors
    ///
    /// `VersionConflict` when `(lineage_id, version_number)` is taken.
    async fn create_version(&self, new: NewVersion) -> Result<DiagramVersion, StoreError>;

    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    async fn get_version(&self, id: Uuid) -> Result<DiagramVersion, StoreError>;

    /// Highest `version_number` in the lineage.
    ///
    /// # Errors
    ///
    /// `NotFound` when the lineage has no versions.
    async fn latest_in_lineage(&self, lineage_id: Uuid) -> Result<DiagramVersion, StoreError>;

    /// All versions of a lineage, oldest first.
    ///
    /// # Errors
    ///
    /// Backend failures only; an unknown lineage is an empty list.
    async fn list_lineage(&self, lineage_id: Uuid) -> Result<Vec<DiagramVersion>, StoreError>;

    /// Latest version of every lineage the owner has, newest first.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    async fn latest_per_owner(&self, owner_id: Uuid) -> Result<Vec<DiagramVersion>, StoreError>;

    /// Remove every version, chat entry and index entry of the lineage.
    /// Returns the number of versions removed.
    ///
    /// # Errors
    ///
    /// `NotFound` when the lineage has no versions.
    async fn delete_lineage(&self, lineage_id: Uuid) -> Result<u64, StoreError>;

    /// # Errors
    ///
    /// Backend failures only.
    async fn append_chat(&self, entry: ChatEntry) -> Result<(), StoreError>;

    /// Conversation log of a lineage, oldest first.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    async fn chat_history(&self, lineage_id: Uuid) -> Result<Vec<ChatEntry>, StoreError>;

    /// Add version ids to the owner's generated-diagram index.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    async fn record_generated(&self, owner_id: Uuid, version_ids: &[Uuid]) -> Result<(), StoreError>;

    /// The owner's generated-diagram index, in insertion order.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    async fn generated_ids(&self, owner_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
