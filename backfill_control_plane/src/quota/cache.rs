use std::{sync::Arc, time::Duration};

use backfill_observability::Counter;
use backfill_resources::OrganizationName;
use tracing::debug;

use super::{QuotaError, QuotaTrackerFactory, QuotaTrackerRef, Result};

#[derive(Debug, Clone)]
pub struct QuotaCacheOptions {
    max_capacity: usize,
    time_to_live: Duration,
}

/// Cache of quota trackers, at most one per organization.
///
/// An entry stays usable while it was accessed within the time to live. Each
/// hit refreshes it; a miss or an expired entry builds a new tracker.
#[derive(Clone)]
pub struct QuotaCache {
    factory: Arc<dyn QuotaTrackerFactory>,
    inner: moka::future::Cache<OrganizationName, QuotaTrackerRef>,
    builds: Counter<u64>,
}

impl QuotaCache {
    pub fn new(factory: Arc<dyn QuotaTrackerFactory>) -> Self {
        Self::with_options(factory, QuotaCacheOptions::default())
    }

    pub fn with_options(factory: Arc<dyn QuotaTrackerFactory>, options: QuotaCacheOptions) -> Self {
        // Idle expiration: the deadline moves forward on every access.
        let inner = moka::future::Cache::builder()
            .max_capacity(options.max_capacity as u64)
            .time_to_idle(options.time_to_live)
            .build();

        let builds = backfill_observability::meter("quota")
            .u64_counter("backfill.quota_cache.builds")
            .with_description("the number of quota trackers built")
            .build();

        Self {
            factory,
            inner,
            builds,
        }
    }

    /// Return the organization's tracker, building it on a miss.
    pub async fn get(&self, organization: &OrganizationName) -> Result<QuotaTrackerRef> {
        let factory = self.factory.clone();
        let builds = self.builds.clone();
        let key = organization.clone();
        let tracker = self
            .inner
            .try_get_with(organization.clone(), async move {
                debug!(organization = %key, "Building quota tracker");
                let tracker = factory.build_tracker(&key).await?;
                builds.add(1, &[]);
                Ok::<_, QuotaError>(tracker)
            })
            .await
            .map_err(|err| {
                Arc::try_unwrap(err).unwrap_or_else(|err| QuotaError::Internal {
                    message: format!("failed to unwrap shared error: {err}"),
                })
            })?;

        Ok(tracker)
    }

    /// Drop the organization's tracker so the next access rebuilds it.
    pub async fn invalidate(&self, organization: &OrganizationName) {
        self.inner.invalidate(organization).await;
    }

    /// Evict expired entries.
    ///
    /// Access-time expiration already hides stale entries, this only reclaims
    /// their memory.
    pub async fn evict_expired(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// The number of cached trackers, including expired ones not yet evicted.
    pub fn tracker_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl QuotaCacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn with_time_to_live(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = time_to_live;
        self
    }
}

impl Default for QuotaCacheOptions {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_live: Duration::from_secs(30 * 60), // 30 minutes
        }
    }
}
