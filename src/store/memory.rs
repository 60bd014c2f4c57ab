//! In-memory [`VersionStore`]. Process-local; contents vanish on exit.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatEntry, DiagramVersion, NewVersion, StoreError, VersionStore, now_ms};

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    versions: HashMap<Uuid, DiagramVersion>,
    /// Version ids per lineage in insertion order.
    lineages: HashMap<Uuid, Vec<Uuid>>,
    chat: HashMap<Uuid, Vec<ChatEntry>>,
    generated: HashMap<Uuid, Vec<Uuid>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn lineage_versions(&self, lineage_id: Uuid) -> impl Iterator<Item = &DiagramVersion> {
        self.lineages
            .get(&lineage_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.versions.get(id))
    }
}

#[async_trait::async_trait]
impl VersionStore for MemoryStore {
    async fn create_version(&self, new: NewVersion) -> Result<DiagramVersion, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .lineage_versions(new.lineage_id)
            .any(|v| v.version_number == new.version_number)
        {
            return Err(StoreError::VersionConflict { lineage_id: new.lineage_id, version_number: new.version_number });
        }
        let version = new.into_version(Uuid::new_v4(), now_ms());
        inner.lineages.entry(version.lineage_id).or_default().push(version.id);
        inner.versions.insert(version.id, version.clone());
        Ok(version)
    }

    async fn get_version(&self, id: Uuid) -> Result<DiagramVersion, StoreError> {
        let inner = self.inner.read().await;
        inner.versions.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn latest_in_lineage(&self, lineage_id: Uuid) -> Result<DiagramVersion, StoreError> {
        let inner = self.inner.read().await;
        inner
            .lineage_versions(lineage_id)
            .max_by_key(|v| v.version_number)
            .cloned()
            .ok_or(StoreError::NotFound(lineage_id))
    }

    async fn list_lineage(&self, lineage_id: Uuid) -> Result<Vec<DiagramVersion>, StoreError> {
        let inner = self.inner.read().await;
        let mut versions: Vec<DiagramVersion> = inner.lineage_versions(lineage_id).cloned().collect();
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }

    async fn latest_per_owner(&self, owner_id: Uuid) -> Result<Vec<DiagramVersion>, StoreError> {
        let inner = self.inner.read().await;
        let mut latest: Vec<DiagramVersion> = inner
            .lineages
            .keys()
            .filter_map(|&lineage_id| inner.lineage_versions(lineage_id).max_by_key(|v| v.version_number))
            .filter(|v| v.owner_id == owner_id)
            .cloned()
            .collect();
        latest.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(latest)
    }

    async fn delete_lineage(&self, lineage_id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(ids) = inner.lineages.remove(&lineage_id) else {
            return Err(StoreError::NotFound(lineage_id));
        };
        for id in &ids {
            inner.versions.remove(id);
        }
        inner.chat.remove(&lineage_id);
        for index in inner.generated.values_mut() {
            index.retain(|id| !ids.contains(id));
        }
        Ok(ids.len() as u64)
    }

    async fn append_chat(&self, entry: ChatEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.chat.entry(entry.lineage_id).or_default().push(entry);
        Ok(())
    }

    async fn chat_history(&self, lineage_id: Uuid) -> Result<Vec<ChatEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.chat.get(&lineage_id).cloned().unwrap_or_default())
    }

    async fn record_generated(&self, owner_id: Uuid, version_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let index = inner.generated.entry(owner_id).or_default();
        for id in version_ids {
            if !index.contains(id) {
                index.push(*id);
            }
        }
        Ok(())
    }

    async fn generated_ids(&self, owner_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.generated.get(&owner_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
