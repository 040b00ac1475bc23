//! Periodic reclamation of abandoned import slots and stale quota trackers.

use std::time::Duration;

use backfill_control_plane::{gate::ConcurrencyGate, quota::QuotaCache};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperOptions {
    pub interval: Duration,
}

impl SweeperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for SweeperOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60), // 15 minutes
        }
    }
}

/// What one sweep reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub reclaimed_slots: usize,
    /// Trackers still cached after eviction.
    pub remaining_trackers: u64,
}

pub struct Sweeper {
    gate: ConcurrencyGate,
    quota_cache: QuotaCache,
    options: SweeperOptions,
}

pub async fn run_background_sweeper(sweeper: Sweeper, ct: CancellationToken) {
    sweeper.run(ct).await
}

impl Sweeper {
    pub fn new(gate: ConcurrencyGate, quota_cache: QuotaCache, options: SweeperOptions) -> Self {
        Self {
            gate,
            quota_cache,
            options,
        }
    }

    pub async fn sweep_once(&self) -> SweepReport {
        let reclaimed_slots = self.gate.sweep_all();
        self.quota_cache.evict_expired().await;
        let remaining_trackers = self.quota_cache.tracker_count();

        if reclaimed_slots > 0 {
            warn!(reclaimed_slots, "Reclaimed slots of abandoned imports");
        }

        debug!(reclaimed_slots, remaining_trackers, "Sweep completed");

        SweepReport {
            reclaimed_slots,
            remaining_trackers,
        }
    }

    async fn run(self, ct: CancellationToken) {
        let period = self.options.interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        debug!("Sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use backfill_control_plane::{gate::ConcurrencyGateOptions, quota::WindowQuotaTrackerFactory};
    use backfill_resources::{ImportId, OrganizationName};

    use super::*;

    fn gate_with_timeout(timeout: Duration) -> ConcurrencyGate {
        ConcurrencyGate::new(ConcurrencyGateOptions::new().with_import_timeout(timeout))
    }

    fn quota_cache() -> QuotaCache {
        QuotaCache::new(Arc::new(WindowQuotaTrackerFactory::default()))
    }

    #[tokio::test]
    async fn test_sweep_once_reclaims_timed_out_slots() {
        tokio::time::pause();

        let gate = gate_with_timeout(Duration::from_secs(60));
        let acme = OrganizationName::new_unchecked("acme");
        gate.register(&acme, ImportId::new());

        let cache = quota_cache();
        cache.get(&acme).await.expect("tracker");

        let sweeper = Sweeper::new(gate.clone(), cache, SweeperOptions::default());
        let report = sweeper.sweep_once().await;
        assert_eq!(report.reclaimed_slots, 0);
        assert_eq!(report.remaining_trackers, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(sweeper.sweep_once().await.reclaimed_slots, 1);
        assert!(gate.active_imports(&acme).is_empty());
    }

    #[tokio::test]
    async fn test_background_sweeper_runs_on_interval_until_cancelled() {
        tokio::time::pause();

        let gate = gate_with_timeout(Duration::from_secs(1));
        let acme = OrganizationName::new_unchecked("acme");
        gate.register(&acme, ImportId::new());

        let sweeper = Sweeper::new(
            gate.clone(),
            quota_cache(),
            SweeperOptions::new().with_interval(Duration::from_secs(10)),
        );
        let ct = CancellationToken::new();
        let task = tokio::spawn(run_background_sweeper(sweeper, ct.clone()));
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(gate.active_imports(&acme).len(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(gate.active_imports(&acme).is_empty());

        ct.cancel();
        task.await.expect("sweeper task");
    }
}
