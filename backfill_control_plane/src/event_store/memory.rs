use async_trait::async_trait;
use backfill_resources::{ImportId, ImportedEvent, SiteName};
use tokio::sync::RwLock;

use super::{EventStore, Result};

/// In-memory event store.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    rows: RwLock<Vec<ImportedEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of every stored row.
    pub async fn rows(&self) -> Vec<ImportedEvent> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert_events(&self, events: Vec<ImportedEvent>) -> Result<u64> {
        let written = events.len() as u64;
        self.rows.write().await.extend(events);
        Ok(written)
    }

    async fn delete_import_events(&self, site: &SiteName, import_id: ImportId) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| !row.belongs_to(site, import_id));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_batch_events(
        &self,
        site: &SiteName,
        import_id: ImportId,
        batch_id: &str,
    ) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| !row.belongs_to_batch(site, import_id, batch_id));
        Ok((before - rows.len()) as u64)
    }

    async fn count_import_events(&self, site: &SiteName, import_id: ImportId) -> Result<u64> {
        let rows = self.rows.read().await;
        let count = rows
            .iter()
            .filter(|row| row.belongs_to(site, import_id))
            .count();
        Ok(count as u64)
    }
}
