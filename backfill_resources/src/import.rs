use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{
    name::{ResourceError, ResourceResult},
    organization::OrganizationName,
    site::SiteName,
};

/// Opaque, unique identifier of an import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportId(Ulid);

impl ImportId {
    /// Generate a new, time-ordered import id.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn parse(id: &str) -> ResourceResult<Self> {
        Ulid::from_string(id)
            .map(Self)
            .map_err(|_| ResourceError::InvalidImportId { id: id.to_string() })
    }
}

impl Default for ImportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ImportId {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The third-party analytics platform an import reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Umami,
    SimpleAnalytics,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Umami => "umami",
            Platform::SimpleAnalytics => "simple_analytics",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-batch event counts.
///
/// For a single batch `imported + skipped` is the number of events that
/// survived transformation and `invalid` is the number that did not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub imported: u64,
    pub skipped: u64,
    pub invalid: u64,
}

impl BatchCounts {
    pub fn new(imported: u64, skipped: u64, invalid: u64) -> Self {
        Self {
            imported,
            skipped,
            invalid,
        }
    }

    /// Total number of raw events accounted for.
    pub fn total(&self) -> u64 {
        self.imported + self.skipped + self.invalid
    }
}

/// Lifecycle state derived from an import record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    /// No batch has been accounted for yet.
    Created,
    /// At least one batch was accounted for and the import is still open.
    Active,
    /// The last batch was received.
    Completed,
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStatus::Created => f.write_str("created"),
            ImportStatus::Active => f.write_str("active"),
            ImportStatus::Completed => f.write_str("completed"),
        }
    }
}

/// The metadata record of one import job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub import_id: ImportId,
    pub site: SiteName,
    pub organization: OrganizationName,
    /// Detected from the first batch. Set at most once.
    pub platform: Option<Platform>,
    pub imported_events: u64,
    pub skipped_events: u64,
    pub invalid_events: u64,
    pub started_at: DateTime<Utc>,
    /// Set when the last batch is accounted for. Never unset.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Import {
    /// Create a fresh import record with zeroed counters.
    pub fn new(
        import_id: ImportId,
        site: SiteName,
        organization: OrganizationName,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            import_id,
            site,
            organization,
            platform: None,
            imported_events: 0,
            skipped_events: 0,
            invalid_events: 0,
            started_at,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn status(&self) -> ImportStatus {
        if self.is_completed() {
            ImportStatus::Completed
        } else if self.counts().total() == 0 && self.platform.is_none() {
            ImportStatus::Created
        } else {
            ImportStatus::Active
        }
    }

    /// Cumulative counts over all accounted batches.
    pub fn counts(&self) -> BatchCounts {
        BatchCounts::new(
            self.imported_events,
            self.skipped_events,
            self.invalid_events,
        )
    }

    /// Apply a batch's counts as a delta.
    pub fn apply_counts(&mut self, counts: BatchCounts) {
        self.imported_events += counts.imported;
        self.skipped_events += counts.skipped;
        self.invalid_events += counts.invalid;
    }
}
