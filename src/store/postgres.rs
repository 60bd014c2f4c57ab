//! Postgres [`VersionStore`] over sqlx runtime queries.
//!
//! Structured data is stored as JSONB through `sqlx::types::Json`, so the
//! parse sentinel and real diagram data share one column. Deleting a lineage
//! runs in one transaction so versions, chat and index entries go together.

use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{ChatEntry, ChatRole, DiagramVersion, NewVersion, StoreError, VersionOrigin, VersionStore, now_ms};
use crate::diagram::{DiagramType, StructuredData};

const VERSION_COLUMNS: &str = "id, lineage_id, owner_id, diagram_type, prompt_text, structured_data, \
     rendered_code, parent_version_id, version_number, origin, title, created_at";

type VersionRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    Option<String>,
    Json<StructuredData>,
    String,
    Option<Uuid>,
    i32,
    String,
    String,
    i64,
);

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn version_from_row(row: VersionRow) -> Result<DiagramVersion, StoreError> {
    let (
        id,
        lineage_id,
        owner_id,
        diagram_type,
        prompt_text,
        Json(structured_data),
        rendered_code,
        parent_version_id,
        version_number,
        origin,
        title,
        created_at,
    ) = row;
    let diagram_type: DiagramType = diagram_type
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("version {id}: {e}")))?;
    Ok(DiagramVersion {
        id,
        lineage_id,
        owner_id,
        diagram_type,
        prompt_text,
        structured_data,
        rendered_code,
        parent_version_id,
        version_number,
        origin: origin.parse::<VersionOrigin>()?,
        title,
        created_at,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait::async_trait]
impl VersionStore for PgStore {
    async fn create_version(&self, new: NewVersion) -> Result<DiagramVersion, StoreError> {
        let version = new.into_version(Uuid::new_v4(), now_ms());
        let result = sqlx::query(
            "INSERT INTO diagram_versions (id, lineage_id, owner_id, diagram_type, prompt_text, structured_data, \
             rendered_code, parent_version_id, version_number, origin, title, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(version.id)
        .bind(version.lineage_id)
        .bind(version.owner_id)
        .bind(version.diagram_type.as_str())
        .bind(version.prompt_text.as_deref())
        .bind(Json(&version.structured_data))
        .bind(&version.rendered_code)
        .bind(version.parent_version_id)
        .bind(version.version_number)
        .bind(version.origin.as_str())
        .bind(&version.title)
        .bind(version.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(version),
            Err(e) if is_unique_violation(&e) => Err(StoreError::VersionConflict {
                lineage_id: version.lineage_id,
                version_number: version.version_number,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_version(&self, id: Uuid) -> Result<DiagramVersion, StoreError> {
        let row = sqlx::query_as::<_, VersionRow>(&format!("SELECT {VERSION_COLUMNS} FROM diagram_versions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        version_from_row(row)
    }

    async fn latest_in_lineage(&self, lineage_id: Uuid) -> Result<DiagramVersion, StoreError> {
        let row = sqlx::query_as::<_, VersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM diagram_versions WHERE lineage_id = $1 \
             ORDER BY version_number DESC LIMIT 1"
        ))
        .bind(lineage_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(lineage_id))?;
        version_from_row(row)
    }

    async fn list_lineage(&self, lineage_id: Uuid) -> Result<Vec<DiagramVersion>, StoreError> {
        let rows = sqlx::query_as::<_, VersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM diagram_versions WHERE lineage_id = $1 ORDER BY version_number ASC"
        ))
        .bind(lineage_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(version_from_row).collect()
    }

    async fn latest_per_owner(&self, owner_id: Uuid) -> Result<Vec<DiagramVersion>, StoreError> {
        let rows = sqlx::query_as::<_, VersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM ( \
                 SELECT DISTINCT ON (lineage_id) {VERSION_COLUMNS} FROM diagram_versions \
                 WHERE owner_id = $1 ORDER BY lineage_id, version_number DESC \
             ) latest ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(version_from_row).collect()
    }

    async fn delete_lineage(&self, lineage_id: Uuid) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM generated_diagrams WHERE version_id IN \
             (SELECT id FROM diagram_versions WHERE lineage_id = $1)",
        )
        .bind(lineage_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM chat_messages WHERE lineage_id = $1")
            .bind(lineage_id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM diagram_versions WHERE lineage_id = $1")
            .bind(lineage_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound(lineage_id));
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn append_chat(&self, entry: ChatEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_messages (id, lineage_id, role, content, resulting_version_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.lineage_id)
        .bind(entry.role.as_str())
        .bind(&entry.content)
        .bind(entry.resulting_version_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn chat_history(&self, lineage_id: Uuid) -> Result<Vec<ChatEntry>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, Option<Uuid>, i64)>(
            "SELECT id, role, content, resulting_version_id, created_at FROM chat_messages \
             WHERE lineage_id = $1 ORDER BY created_at ASC, seq ASC",
        )
        .bind(lineage_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, role, content, resulting_version_id, created_at)| {
                Ok(ChatEntry { id, lineage_id, role: role.parse::<ChatRole>()?, content, resulting_version_id, created_at })
            })
            .collect()
    }

    async fn record_generated(&self, owner_id: Uuid, version_ids: &[Uuid]) -> Result<(), StoreError> {
        if version_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO generated_diagrams (owner_id, version_id) \
             SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(owner_id)
        .bind(version_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn generated_ids(&self, owner_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT version_id FROM generated_diagrams WHERE owner_id = $1 ORDER BY seq ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
