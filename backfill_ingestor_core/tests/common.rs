#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use backfill_control_plane::{
    event_store::{EventStore, EventStoreError, InMemoryEventStore},
    gate::ConcurrencyGate,
    import_metadata::{
        BatchClaim, BatchProgress, ImportMetadata, ImportMetadataError, InMemoryImportMetadata,
        ListImportsRequest, ListImportsResponse,
    },
    quota::{QuotaCache, QuotaSummary, QuotaTracker, QuotaTrackerFactory, QuotaTrackerRef},
    sites::{InMemorySiteDirectory, SiteDirectory},
};
use backfill_ingestor_core::{
    AllowAllAuthorizer, Authorizer, Caller, ImportOptions, ImportService,
};
use backfill_resources::{
    Import, ImportId, ImportedEvent, OrganizationName, Platform, SiteName,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};

/// Events before this instant fall outside the test quota window.
pub fn quota_cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Admits events at or after a fixed cutoff.
#[derive(Debug)]
pub struct CutoffTracker {
    earliest: DateTime<Utc>,
}

impl QuotaTracker for CutoffTracker {
    fn admit(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.earliest
    }

    fn summary(&self) -> QuotaSummary {
        QuotaSummary {
            oldest_allowed_period: self.earliest.date_naive(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CutoffTrackerFactory {
    pub builds: AtomicU64,
}

#[async_trait]
impl QuotaTrackerFactory for CutoffTrackerFactory {
    async fn build_tracker(
        &self,
        _organization: &OrganizationName,
    ) -> backfill_control_plane::quota::Result<QuotaTrackerRef> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CutoffTracker {
            earliest: quota_cutoff(),
        }))
    }
}

fn unavailable() -> EventStoreError {
    EventStoreError::Unavailable {
        message: "injected failure".to_string(),
    }
}

/// Event store whose operations can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyEventStore {
    pub inner: InMemoryEventStore,
    pub fail_inserts: AtomicBool,
    pub fail_deletes: AtomicBool,
    /// Yield to the scheduler before every write.
    pub yield_on_write: AtomicBool,
    pub mutations: AtomicU64,
}

impl FlakyEventStore {
    pub async fn rows(&self) -> Vec<ImportedEvent> {
        self.inner.rows().await
    }

    async fn maybe_yield(&self) {
        if self.yield_on_write.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl EventStore for FlakyEventStore {
    async fn insert_events(
        &self,
        events: Vec<ImportedEvent>,
    ) -> backfill_control_plane::event_store::Result<u64> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.maybe_yield().await;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_events(events).await
    }

    async fn delete_import_events(
        &self,
        site: &SiteName,
        import_id: ImportId,
    ) -> backfill_control_plane::event_store::Result<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_import_events(site, import_id).await
    }

    async fn delete_batch_events(
        &self,
        site: &SiteName,
        import_id: ImportId,
        batch_id: &str,
    ) -> backfill_control_plane::event_store::Result<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.maybe_yield().await;
        self.inner
            .delete_batch_events(site, import_id, batch_id)
            .await
    }

    async fn count_import_events(
        &self,
        site: &SiteName,
        import_id: ImportId,
    ) -> backfill_control_plane::event_store::Result<u64> {
        self.inner.count_import_events(site, import_id).await
    }
}

/// Import metadata store whose mutations can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyImportMetadata {
    pub inner: InMemoryImportMetadata,
    pub fail_record_batch: AtomicBool,
    pub fail_finalize: AtomicBool,
    pub fail_delete: AtomicBool,
}

fn metadata_failure() -> ImportMetadataError {
    ImportMetadataError::Internal {
        message: "injected failure".to_string(),
    }
}

#[async_trait]
impl ImportMetadata for FlakyImportMetadata {
    async fn create_import(
        &self,
        import: Import,
    ) -> backfill_control_plane::import_metadata::Result<Import> {
        self.inner.create_import(import).await
    }

    async fn get_import(
        &self,
        import_id: ImportId,
    ) -> backfill_control_plane::import_metadata::Result<Import> {
        self.inner.get_import(import_id).await
    }

    async fn list_imports(
        &self,
        request: ListImportsRequest,
    ) -> backfill_control_plane::import_metadata::Result<ListImportsResponse> {
        self.inner.list_imports(request).await
    }

    async fn set_platform(
        &self,
        import_id: ImportId,
        platform: Platform,
    ) -> backfill_control_plane::import_metadata::Result<Import> {
        self.inner.set_platform(import_id, platform).await
    }

    async fn record_batch(
        &self,
        import_id: ImportId,
        progress: BatchProgress,
    ) -> backfill_control_plane::import_metadata::Result<Import> {
        if self.fail_record_batch.load(Ordering::SeqCst) {
            return Err(metadata_failure());
        }
        self.inner.record_batch(import_id, progress).await
    }

    async fn begin_batch(
        &self,
        import_id: ImportId,
        batch_id: &str,
    ) -> backfill_control_plane::import_metadata::Result<BatchClaim> {
        self.inner.begin_batch(import_id, batch_id).await
    }

    async fn release_batch(
        &self,
        import_id: ImportId,
        batch_id: &str,
    ) -> backfill_control_plane::import_metadata::Result<()> {
        self.inner.release_batch(import_id, batch_id).await
    }

    async fn finalize(
        &self,
        import_id: ImportId,
        completed_at: DateTime<Utc>,
    ) -> backfill_control_plane::import_metadata::Result<Import> {
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(metadata_failure());
        }
        self.inner.finalize(import_id, completed_at).await
    }

    async fn delete_import(
        &self,
        import_id: ImportId,
    ) -> backfill_control_plane::import_metadata::Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(metadata_failure());
        }
        self.inner.delete_import(import_id).await
    }
}

pub struct TestHarness {
    pub service: ImportService,
    pub sites: Arc<InMemorySiteDirectory>,
    pub gate: ConcurrencyGate,
    pub quota_cache: QuotaCache,
    pub quota_factory: Arc<CutoffTrackerFactory>,
    pub metadata: Arc<FlakyImportMetadata>,
    pub events: Arc<FlakyEventStore>,
    pub organization: OrganizationName,
    pub site: SiteName,
    pub caller: Caller,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_options(ImportOptions::default()).await
    }

    pub async fn with_options(options: ImportOptions) -> Self {
        let sites = Arc::new(InMemorySiteDirectory::new());
        let organization = OrganizationName::new_unchecked("acme");
        let site = SiteName::new_unchecked("blog");

        sites
            .create_organization(organization.clone())
            .await
            .expect("create_organization");
        sites
            .create_site(site.clone(), organization.clone())
            .await
            .expect("create_site");
        sites
            .create_site(SiteName::new_unchecked("shop"), organization.clone())
            .await
            .expect("create_site");

        let quota_factory = Arc::new(CutoffTrackerFactory::default());
        let quota_cache = QuotaCache::new(quota_factory.clone());
        let gate = ConcurrencyGate::new(options.gate_options());
        let metadata = Arc::new(FlakyImportMetadata::default());
        let events = Arc::new(FlakyEventStore::default());

        let service = ImportService::new(
            sites.clone(),
            metadata.clone(),
            events.clone(),
            Arc::new(AllowAllAuthorizer),
            quota_cache.clone(),
            gate.clone(),
        )
        .with_max_batch_size(options.max_batch_size);

        Self {
            service,
            sites,
            gate,
            quota_cache,
            quota_factory,
            metadata,
            events,
            organization,
            site,
            caller: Caller::new("alice"),
        }
    }

    /// A service sharing this harness' stores but checking callers with
    /// the given authorizer.
    pub fn service_with_authorizer(&self, authorizer: Arc<dyn Authorizer>) -> ImportService {
        ImportService::new(
            self.sites.clone(),
            self.metadata.clone(),
            self.events.clone(),
            authorizer,
            self.quota_cache.clone(),
            self.gate.clone(),
        )
    }

    pub async fn create_import(&self) -> Import {
        self.service
            .create_import(&self.caller, &self.site)
            .await
            .expect("create_import")
            .import
    }

    pub async fn stored_import(&self, import_id: ImportId) -> Import {
        self.metadata
            .get_import(import_id)
            .await
            .expect("get_import")
    }
}

/// A valid Umami page view at the given time.
pub fn umami_event(created_at: &str) -> Value {
    json!({
        "session_id": "6f9b2c",
        "url_path": "/docs",
        "created_at": created_at,
        "event_type": 1,
        "hostname": "example.com",
        "referrer_domain": "github.com",
    })
}

/// A Umami row with an unparsable timestamp.
pub fn invalid_umami_event() -> Value {
    umami_event("not a timestamp")
}

/// Rows inside the quota window.
pub fn admitted_events(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| umami_event(&format!("2024-02-01 10:{:02}:{:02}", (i / 60) % 60, i % 60)))
        .collect()
}

/// Rows older than the quota window.
pub fn over_quota_events(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| umami_event(&format!("2023-06-01 10:{:02}:{:02}", (i / 60) % 60, i % 60)))
        .collect()
}

pub fn cutoff_date() -> NaiveDate {
    quota_cutoff().date_naive()
}
