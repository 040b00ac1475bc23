//! Durable metadata of import jobs.
//!
//! The store keeps one record per import. Progress counters are only ever
//! changed through [`ImportMetadata::record_batch`], which applies deltas so
//! that overlapping or retried batches never lose updates.

mod error;
mod memory;

use async_trait::async_trait;
use backfill_resources::{BatchCounts, Import, ImportId, Platform, SiteName};
use chrono::{DateTime, Utc};

pub use self::error::{ImportMetadataError, Result};
pub use self::memory::InMemoryImportMetadata;

#[async_trait]
pub trait ImportMetadata: Send + Sync {
    /// Insert a new import record.
    async fn create_import(&self, import: Import) -> Result<Import>;

    /// Return the specified import.
    async fn get_import(&self, import_id: ImportId) -> Result<Import>;

    /// List the imports of a site, most recent first.
    async fn list_imports(&self, request: ListImportsRequest) -> Result<ListImportsResponse>;

    /// Store the detected platform if none is stored yet.
    ///
    /// Returns the record as stored, which carries the earlier platform if
    /// another batch won the race.
    async fn set_platform(&self, import_id: ImportId, platform: Platform) -> Result<Import>;

    /// Atomically add a batch's counts to the import's counters.
    ///
    /// When the progress carries a batch id, the counts are remembered under
    /// that id and a second call with the same id fails with `DuplicateBatch`.
    async fn record_batch(&self, import_id: ImportId, progress: BatchProgress) -> Result<Import>;

    /// Claim a batch id before writing the batch's events.
    ///
    /// Only one claim of an id can be pending at a time. The claim is
    /// settled by [`ImportMetadata::record_batch`] or dropped by
    /// [`ImportMetadata::release_batch`].
    async fn begin_batch(&self, import_id: ImportId, batch_id: &str) -> Result<BatchClaim>;

    /// Drop a pending claim so the batch can be resubmitted.
    ///
    /// Recorded batches are left untouched.
    async fn release_batch(&self, import_id: ImportId, batch_id: &str) -> Result<()>;

    /// Mark the import completed.
    ///
    /// Completing an already completed import keeps the first timestamp.
    async fn finalize(&self, import_id: ImportId, completed_at: DateTime<Utc>) -> Result<Import>;

    /// Delete the import record.
    async fn delete_import(&self, import_id: ImportId) -> Result<()>;
}

/// Counts of one batch, optionally keyed by an idempotency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub batch_id: Option<String>,
    pub counts: BatchCounts,
}

impl BatchProgress {
    pub fn new(counts: BatchCounts) -> Self {
        Self {
            batch_id: None,
            counts,
        }
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }
}

/// Outcome of claiming a batch id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchClaim {
    /// The caller owns the batch id and may write its events.
    Claimed,
    /// Another submission of the batch id is being written.
    InProgress,
    /// The batch was already accounted for with these counts.
    Recorded(BatchCounts),
}

/// Request to list imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListImportsRequest {
    /// The site whose imports to list.
    pub site: SiteName,
    /// The number of imports to return.
    /// Default: 100, Maximum: 1000.
    pub page_size: Option<usize>,
    /// The continuation token.
    pub page_token: Option<String>,
}

impl ListImportsRequest {
    pub fn new(site: SiteName) -> Self {
        Self {
            site,
            page_size: Some(100),
            page_token: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_page_token(mut self, page_token: impl Into<String>) -> Self {
        self.page_token = Some(page_token.into());
        self
    }
}

/// Response from listing imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListImportsResponse {
    pub imports: Vec<Import>,
    pub next_page_token: Option<String>,
}
