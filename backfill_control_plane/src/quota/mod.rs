//! Per-organization quota trackers and the cache that amortizes building them.
//!
//! Building a tracker means reading the organization's full usage history, so
//! trackers are built at most once per cache lifetime and then shared
//! read-only by every request of the organization.

mod cache;
mod error;
mod window;

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use backfill_resources::OrganizationName;
use chrono::{DateTime, NaiveDate, Utc};

pub use self::cache::{QuotaCache, QuotaCacheOptions};
pub use self::error::{QuotaError, Result};
pub use self::window::{WindowQuotaOptions, WindowQuotaTracker, WindowQuotaTrackerFactory};

/// Decides whether an event timestamp may be imported for an organization.
///
/// A tracker is a snapshot. Its answers never change during its lifetime,
/// including after it admitted events.
pub trait QuotaTracker: Debug + Send + Sync {
    /// Whether an event with the given timestamp may be imported.
    fn admit(&self, timestamp: DateTime<Utc>) -> bool;

    /// The window that currently applies.
    fn summary(&self) -> QuotaSummary;
}

pub type QuotaTrackerRef = Arc<dyn QuotaTracker>;

/// Summary of the window a tracker enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSummary {
    /// First day of the oldest period events may fall in.
    pub oldest_allowed_period: NaiveDate,
}

/// Builds trackers from an organization's usage history.
#[async_trait]
pub trait QuotaTrackerFactory: Send + Sync {
    async fn build_tracker(&self, organization: &OrganizationName) -> Result<QuotaTrackerRef>;
}
