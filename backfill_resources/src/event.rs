use chrono::{DateTime, Utc};

use crate::{import::ImportId, site::SiteName};

/// An event in the platform's internal shape, ready for the event store.
///
/// Rows are tagged with the site and import they belong to so that an
/// import's rows can be deleted or counted regardless of write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedEvent {
    pub site: SiteName,
    pub import_id: ImportId,
    /// Idempotency token of the batch that wrote the row, if any.
    pub batch_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub hostname: String,
    pub pathname: String,
    pub referrer: Option<String>,
    pub event_name: String,
}

impl ImportedEvent {
    pub fn belongs_to(&self, site: &SiteName, import_id: ImportId) -> bool {
        self.import_id == import_id && &self.site == site
    }

    pub fn belongs_to_batch(&self, site: &SiteName, import_id: ImportId, batch_id: &str) -> bool {
        self.belongs_to(site, import_id) && self.batch_id.as_deref() == Some(batch_id)
    }
}
