//! Quota tracker bounded by a calendar-month window.

use std::sync::Arc;

use async_trait::async_trait;
use backfill_resources::OrganizationName;
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

use super::{QuotaError, QuotaSummary, QuotaTracker, QuotaTrackerFactory, QuotaTrackerRef, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowQuotaOptions {
    /// Number of calendar months, including the current one, events may fall in.
    pub max_history_months: u32,
}

impl Default for WindowQuotaOptions {
    fn default() -> Self {
        Self {
            max_history_months: 12,
        }
    }
}

/// Admits events from the first day of the oldest allowed month up to the
/// end of the day the tracker was built.
#[derive(Debug, Clone)]
pub struct WindowQuotaTracker {
    oldest_allowed_period: NaiveDate,
    earliest: DateTime<Utc>,
    latest_exclusive: DateTime<Utc>,
}

impl WindowQuotaTracker {
    pub fn new(built_at: DateTime<Utc>, options: WindowQuotaOptions) -> Result<Self> {
        let today = built_at.date_naive();
        let months_back = options.max_history_months.saturating_sub(1);

        let oldest_allowed_period = today
            .with_day(1)
            .and_then(|first_of_month| first_of_month.checked_sub_months(Months::new(months_back)))
            .ok_or_else(|| QuotaError::Internal {
                message: format!("history window of {months_back} months is out of range"),
            })?;

        let tomorrow = today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| QuotaError::Internal {
                message: format!("no day after {today}"),
            })?;

        Ok(Self {
            oldest_allowed_period,
            earliest: oldest_allowed_period.and_time(NaiveTime::MIN).and_utc(),
            latest_exclusive: tomorrow.and_time(NaiveTime::MIN).and_utc(),
        })
    }
}

impl QuotaTracker for WindowQuotaTracker {
    fn admit(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.earliest && timestamp < self.latest_exclusive
    }

    fn summary(&self) -> QuotaSummary {
        QuotaSummary {
            oldest_allowed_period: self.oldest_allowed_period,
        }
    }
}

/// Builds [`WindowQuotaTracker`]s anchored at the current time.
#[derive(Debug, Clone, Default)]
pub struct WindowQuotaTrackerFactory {
    options: WindowQuotaOptions,
}

impl WindowQuotaTrackerFactory {
    pub fn new(options: WindowQuotaOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl QuotaTrackerFactory for WindowQuotaTrackerFactory {
    async fn build_tracker(&self, organization: &OrganizationName) -> Result<QuotaTrackerRef> {
        let tracker =
            WindowQuotaTracker::new(Utc::now(), self.options).map_err(|err| QuotaError::Build {
                organization: organization.clone(),
                message: err.to_string(),
            })?;
        Ok(Arc::new(tracker))
    }
}
