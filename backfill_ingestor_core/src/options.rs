use std::time::Duration;

use backfill_control_plane::gate::ConcurrencyGateOptions;

/// Default maximum number of raw events in one batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

/// Limits applied to imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Maximum number of concurrent imports per organization.
    pub max_concurrent_imports: usize,
    /// Time after which an import that never completed releases its slot.
    pub import_timeout: Duration,
    /// Whether the per-organization limit is enforced at all.
    ///
    /// Single-tenant deployments turn this off.
    pub limit_concurrency: bool,
    /// Maximum number of raw events in one batch.
    pub max_batch_size: usize,
}

impl ImportOptions {
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

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// The options of the concurrency gate enforcing these limits.
    pub fn gate_options(&self) -> ConcurrencyGateOptions {
        ConcurrencyGateOptions::new()
            .with_max_concurrent_imports(self.max_concurrent_imports)
            .with_import_timeout(self.import_timeout)
            .with_limit_concurrency(self.limit_concurrency)
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        let gate = ConcurrencyGateOptions::default();

        Self {
            max_concurrent_imports: gate.max_concurrent_imports,
            import_timeout: gate.import_timeout,
            limit_concurrency: gate.limit_concurrency,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}
