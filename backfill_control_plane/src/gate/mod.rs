//! Per-organization admission of concurrent imports.
//!
//! The gate is a soft limit. [`ConcurrencyGate::can_start`] followed by
//! [`ConcurrencyGate::register`] is not atomic, so two racing admissions can
//! both pass and overshoot the limit by one. Slots of imports that never
//! complete are reclaimed once they are older than the import timeout.

use std::{sync::Arc, time::Duration};

use backfill_observability::{Counter, KeyValue, UpDownCounter};
use backfill_resources::{ImportId, OrganizationName};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::warn;

/// An import currently holding one of its organization's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveImportSlot {
    pub import_id: ImportId,
    pub started_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyGateOptions {
    /// Maximum number of concurrent imports per organization.
    pub max_concurrent_imports: usize,
    /// Age after which a slot is reclaimed without completion.
    pub import_timeout: Duration,
    /// When false, every import is admitted.
    pub limit_concurrency: bool,
}

#[derive(Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    active: DashMap<OrganizationName, Vec<ActiveImportSlot>>,
    options: ConcurrencyGateOptions,
    metrics: GateMetrics,
}

struct GateMetrics {
    active_imports: UpDownCounter<i64>,
    reclaimed_slots: Counter<u64>,
}

impl ConcurrencyGate {
    pub fn new(options: ConcurrencyGateOptions) -> Self {
        let inner = GateInner {
            active: DashMap::new(),
            options,
            metrics: GateMetrics::default(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn options(&self) -> &ConcurrencyGateOptions {
        &self.inner.options
    }

    /// Whether the organization may start another import.
    pub fn can_start(&self, organization: &OrganizationName) -> bool {
        if !self.inner.options.limit_concurrency {
            return true;
        }

        let Some(mut slots) = self.inner.active.get_mut(organization) else {
            return true;
        };

        let reclaimed = self.inner.reclaim(organization, &mut slots, Instant::now());
        let can_start = slots.len() < self.inner.options.max_concurrent_imports;
        drop(slots);

        if reclaimed > 0 {
            self.inner.remove_if_empty(organization);
        }

        can_start
    }

    /// Add the import to the organization's active set.
    ///
    /// This does not check the limit, callers must have just passed
    /// [`ConcurrencyGate::can_start`].
    pub fn register(&self, organization: &OrganizationName, import_id: ImportId) {
        let slot = ActiveImportSlot {
            import_id,
            started_at: Instant::now(),
        };

        self.inner
            .active
            .entry(organization.clone())
            .or_default()
            .push(slot);

        self.inner
            .metrics
            .active_imports
            .add(1, &[KeyValue::new("organization", organization.id().to_string())]);
    }

    /// Remove the import from the organization's active set.
    ///
    /// Removing an import that is not active is a no-op.
    pub fn complete(&self, organization: &OrganizationName, import_id: ImportId) {
        let removed = match self.inner.active.get_mut(organization) {
            Some(mut slots) => {
                let before = slots.len();
                slots.retain(|slot| slot.import_id != import_id);
                before - slots.len()
            }
            None => 0,
        };

        if removed > 0 {
            self.inner.remove_if_empty(organization);
            self.inner.metrics.active_imports.add(
                -(removed as i64),
                &[KeyValue::new("organization", organization.id().to_string())],
            );
        }
    }

    /// Reclaim timed out slots of every organization.
    ///
    /// Returns the number of reclaimed slots.
    pub fn sweep_all(&self) -> usize {
        let now = Instant::now();
        let mut reclaimed = 0;

        self.inner.active.retain(|organization, slots| {
            reclaimed += self.inner.reclaim(organization, slots, now);
            !slots.is_empty()
        });

        reclaimed
    }

    /// The imports currently holding a slot of the organization.
    pub fn active_imports(&self, organization: &OrganizationName) -> Vec<ImportId> {
        self.inner
            .active
            .get(organization)
            .map(|slots| slots.iter().map(|slot| slot.import_id).collect())
            .unwrap_or_default()
    }

    /// Whether the import holds a slot of the organization.
    pub fn is_active(&self, organization: &OrganizationName, import_id: ImportId) -> bool {
        self.active_imports(organization).contains(&import_id)
    }
}

impl GateInner {
    fn reclaim(
        &self,
        organization: &OrganizationName,
        slots: &mut Vec<ActiveImportSlot>,
        now: Instant,
    ) -> usize {
        let timeout = self.options.import_timeout;
        let before = slots.len();

        slots.retain(|slot| {
            let expired = now.saturating_duration_since(slot.started_at) > timeout;
            if expired {
                warn!(
                    organization = %organization,
                    import_id = %slot.import_id,
                    "Reclaiming import slot after timeout"
                );
            }
            !expired
        });

        let reclaimed = before - slots.len();
        if reclaimed > 0 {
            let attributes = [KeyValue::new("organization", organization.id().to_string())];
            self.metrics.active_imports.add(-(reclaimed as i64), &attributes);
            self.metrics.reclaimed_slots.add(reclaimed as u64, &attributes);
        }

        reclaimed
    }

    fn remove_if_empty(&self, organization: &OrganizationName) {
        self.active
            .remove_if(organization, |_, slots| slots.is_empty());
    }
}

impl ConcurrencyGateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent_imports(mut self, max_concurrent_imports: usize) -> Self {
        self.max_concurrent_imports = max_concurrent_imports;
        self
    }

    pub fn with_import_timeout(mut self, import_timeout: Duration) -> Self {
        self.import_timeout = import_timeout;
        self
    }

    pub fn with_limit_concurrency(mut self, limit_concurrency: bool) -> Self {
        self.limit_concurrency = limit_concurrency;
        self
    }
}

impl Default for ConcurrencyGateOptions {
    fn default() -> Self {
        Self {
            max_concurrent_imports: 1,
            import_timeout: Duration::from_secs(2 * 60 * 60), // 2 hours
            limit_concurrency: true,
        }
    }
}

impl Default for GateMetrics {
    fn default() -> Self {
        let meter = backfill_observability::meter("gate");

        Self {
            active_imports: meter
                .i64_up_down_counter("backfill.imports.active")
                .with_description("the number of imports holding a concurrency slot")
                .build(),
            reclaimed_slots: meter
                .u64_counter("backfill.gate.reclaimed")
                .with_description("the number of slots reclaimed after the import timeout")
                .build(),
        }
    }
}
