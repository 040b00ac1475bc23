//! Request and response types of the import endpoints.

use backfill_ingestor_core::{AllowedDateRange, BatchOutcome, CreatedImport};
use backfill_resources::{Import, ImportId, ImportStatus, Platform};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Response payload for `POST /v1/sites/{site}/imports`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateImportResponse {
    pub import_id: ImportId,
    pub allowed_date_range: DateRange,
}

/// Inclusive range of event dates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

/// Request payload for `POST /v1/sites/{site}/imports/{import}/events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBatchBody {
    /// Raw export rows, between 1 and 10000.
    pub events: Vec<serde_json::Value>,
    /// Whether this is the import's last batch.
    #[serde(default)]
    pub is_last_batch: bool,
    /// Idempotency token of the batch.
    ///
    /// Resending a batch with the same token returns the counts of the
    /// first submission without writing events again.
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// Response payload for a submitted batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitBatchResponse {
    pub imported: u64,
    pub skipped: u64,
    pub invalid: u64,
    #[serde(default)]
    pub replayed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportResponse {
    pub import_id: ImportId,
    pub site: String,
    pub organization: String,
    pub platform: Option<Platform>,
    pub status: ImportStatus,
    pub imported_events: u64,
    pub skipped_events: u64,
    pub invalid_events: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing imports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListImportsQuery {
    pub page_size: Option<usize>,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListImportsResponse {
    pub imports: Vec<ImportResponse>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteImportResponse {
    pub message: String,
    pub deleted_events: u64,
}

/// Response payload for errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
}

impl From<AllowedDateRange> for DateRange {
    fn from(range: AllowedDateRange) -> Self {
        Self {
            earliest: range.earliest,
            latest: range.latest,
        }
    }
}

impl From<CreatedImport> for CreateImportResponse {
    fn from(created: CreatedImport) -> Self {
        Self {
            import_id: created.import.import_id,
            allowed_date_range: created.allowed_date_range.into(),
        }
    }
}

impl From<BatchOutcome> for SubmitBatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            imported: outcome.counts.imported,
            skipped: outcome.counts.skipped,
            invalid: outcome.counts.invalid,
            replayed: outcome.replayed,
        }
    }
}

impl From<Import> for ImportResponse {
    fn from(import: Import) -> Self {
        Self {
            import_id: import.import_id,
            status: import.status(),
            site: import.site.id().to_string(),
            organization: import.organization.id().to_string(),
            platform: import.platform,
            imported_events: import.imported_events,
            skipped_events: import.skipped_events,
            invalid_events: import.invalid_events,
            started_at: import.started_at,
            completed_at: import.completed_at,
        }
    }
}
