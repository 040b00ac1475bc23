use backfill_resources::{BatchCounts, Import, ImportId, SiteName};
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{Result, ValidationSnafu};

/// Maximum length of a batch idempotency token.
pub const MAX_BATCH_ID_LEN: usize = 128;

/// A batch of raw export rows for an import.
#[derive(Debug, Clone)]
pub struct SubmitBatchRequest {
    pub site: SiteName,
    pub import_id: ImportId,
    pub events: Vec<Value>,
    pub is_last_batch: bool,
    /// Idempotency token. A batch with a token that was already accounted
    /// for is not written again.
    pub batch_id: Option<String>,
}

impl SubmitBatchRequest {
    pub fn new(site: SiteName, import_id: ImportId, events: Vec<Value>) -> Self {
        Self {
            site,
            import_id,
            events,
            is_last_batch: false,
            batch_id: None,
        }
    }

    pub fn with_last_batch(mut self, is_last_batch: bool) -> Self {
        self.is_last_batch = is_last_batch;
        self
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn validate(&self, max_batch_size: usize) -> Result<()> {
        if self.events.is_empty() {
            return ValidationSnafu {
                message: "batch contains no events".to_string(),
            }
            .fail();
        }

        if self.events.len() > max_batch_size {
            return ValidationSnafu {
                message: format!(
                    "batch contains {} events, the maximum is {max_batch_size}",
                    self.events.len()
                ),
            }
            .fail();
        }

        if let Some(batch_id) = &self.batch_id {
            if batch_id.is_empty() || batch_id.len() > MAX_BATCH_ID_LEN {
                return ValidationSnafu {
                    message: format!(
                        "batch id must be between 1 and {MAX_BATCH_ID_LEN} bytes long"
                    ),
                }
                .fail();
            }
        }

        Ok(())
    }
}

/// Range of event dates the organization may import, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedDateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

/// A newly admitted import.
#[derive(Debug, Clone)]
pub struct CreatedImport {
    pub import: Import,
    pub allowed_date_range: AllowedDateRange,
}

/// Result of accounting for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub counts: BatchCounts,
    /// Whether the counts were recorded by an earlier submission of the
    /// same batch id.
    pub replayed: bool,
}

/// Result of deleting an import.
#[derive(Debug, Clone)]
pub struct DeletedImport {
    pub import: Import,
    pub deleted_events: u64,
}
