//! Bulk store of imported events.

mod error;
mod memory;

use async_trait::async_trait;
use backfill_resources::{ImportId, ImportedEvent, SiteName};

pub use self::error::{EventStoreError, Result};
pub use self::memory::InMemoryEventStore;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a batch of events in one operation.
    ///
    /// Returns the number of rows written.
    async fn insert_events(&self, events: Vec<ImportedEvent>) -> Result<u64>;

    /// Delete every row written by the import.
    ///
    /// Returns the number of rows deleted.
    async fn delete_import_events(&self, site: &SiteName, import_id: ImportId) -> Result<u64>;

    /// Delete the rows written by one batch of the import.
    async fn delete_batch_events(
        &self,
        site: &SiteName,
        import_id: ImportId,
        batch_id: &str,
    ) -> Result<u64>;

    /// Count the rows written by the import.
    async fn count_import_events(&self, site: &SiteName, import_id: ImportId) -> Result<u64>;
}
