//! Admission and ingestion of imports.
//!
//! An import is admitted by [`ImportService::create_import`], which holds
//! one of the organization's concurrency slots until the last batch is
//! accounted for. Batches are transformed, filtered by the organization's
//! quota tracker, written to the event store, and only then accounted in the
//! import metadata. A failed write therefore leaves the counters untouched
//! and the batch can be retried.
//!
//! Batches carrying a batch id are claimed in the import metadata before any
//! row is written, so concurrent submissions of one id write it once.

use std::sync::Arc;

use backfill_control_plane::{
    event_store::EventStore,
    gate::ConcurrencyGate,
    import_metadata::{
        BatchClaim, BatchProgress, ImportMetadata, ListImportsRequest, ListImportsResponse,
    },
    quota::QuotaCache,
    sites::SiteDirectory,
};
use backfill_resources::{BatchCounts, Import, ImportId, Platform, Site, SiteName};
use chrono::Utc;
use serde_json::Value;
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, error, info, warn};

use crate::{
    authz::{Authorizer, Caller},
    batch::{AllowedDateRange, BatchOutcome, CreatedImport, DeletedImport, SubmitBatchRequest},
    error::{
        AlreadyCompletedSnafu, BatchInProgressSnafu, ConcurrencyLimitSnafu, DeleteEventsSnafu,
        DeleteMetadataSnafu, EventStoreSnafu, ForbiddenSnafu, ImportMetadataSnafu,
        ImportNotFoundSnafu, QuotaSnafu, Result, SiteDirectorySnafu, SiteNotFoundSnafu,
        StillActiveSnafu, UnrecognizedFormatSnafu, UnsupportedPlatformSnafu, ValidationSnafu,
        WrongSiteSnafu,
    },
    metrics::ImportMetrics,
    options::DEFAULT_MAX_BATCH_SIZE,
    platform::{EventTarget, PlatformRegistry},
};

/// Maximum page size when listing imports.
pub const MAX_LIST_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct ImportService {
    sites: Arc<dyn SiteDirectory>,
    metadata: Arc<dyn ImportMetadata>,
    events: Arc<dyn EventStore>,
    authorizer: Arc<dyn Authorizer>,
    platforms: PlatformRegistry,
    quota_cache: QuotaCache,
    gate: ConcurrencyGate,
    max_batch_size: usize,
    metrics: Arc<ImportMetrics>,
}

impl ImportService {
    pub fn new(
        sites: Arc<dyn SiteDirectory>,
        metadata: Arc<dyn ImportMetadata>,
        events: Arc<dyn EventStore>,
        authorizer: Arc<dyn Authorizer>,
        quota_cache: QuotaCache,
        gate: ConcurrencyGate,
    ) -> Self {
        Self {
            sites,
            metadata,
            events,
            authorizer,
            platforms: PlatformRegistry::default(),
            quota_cache,
            gate,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            metrics: Arc::new(ImportMetrics::default()),
        }
    }

    pub fn with_platforms(mut self, platforms: PlatformRegistry) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Maximum number of rows accepted in one batch.
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Admit a new import for the site.
    ///
    /// Fails with a rate-limited error when the site's organization already
    /// runs its maximum number of imports.
    pub async fn create_import(&self, caller: &Caller, site: &SiteName) -> Result<CreatedImport> {
        self.authorize(caller, site).await?;
        let site = self.resolve_site(site).await?;
        let organization = site.organization;

        if !self.gate.can_start(&organization) {
            self.metrics.rejected.add(1, &[]);
            info!(
                organization = %organization,
                site = %site.name,
                "Import rejected, concurrency limit reached"
            );
            return ConcurrencyLimitSnafu {
                organization,
                max_concurrent_imports: self.gate.options().max_concurrent_imports,
            }
            .fail();
        }

        let tracker = self
            .quota_cache
            .get(&organization)
            .await
            .context(QuotaSnafu {})?;

        let started_at = Utc::now();
        let import = Import::new(
            ImportId::new(),
            site.name,
            organization.clone(),
            started_at,
        );

        let import = self
            .metadata
            .create_import(import)
            .await
            .context(ImportMetadataSnafu {
                operation: "create import",
            })?;

        self.gate.register(&organization, import.import_id);
        self.metrics.started.add(1, &[]);

        info!(
            import_id = %import.import_id,
            site = %import.site,
            organization = %organization,
            "Import created"
        );

        let allowed_date_range = AllowedDateRange {
            earliest: tracker.summary().oldest_allowed_period,
            latest: started_at.date_naive(),
        };

        Ok(CreatedImport {
            import,
            allowed_date_range,
        })
    }

    /// Ingest one batch of raw rows and account for it.
    pub async fn submit_batch(
        &self,
        caller: &Caller,
        request: SubmitBatchRequest,
    ) -> Result<BatchOutcome> {
        request.validate(self.max_batch_size)?;
        self.authorize(caller, &request.site).await?;

        let import = self.load_import(&request.site, request.import_id).await?;
        let import_id = import.import_id;
        ensure!(!import.is_completed(), AlreadyCompletedSnafu { import_id });

        if let Some(batch_id) = request.batch_id.as_deref() {
            let claim = self
                .metadata
                .begin_batch(import_id, batch_id)
                .await
                .context(ImportMetadataSnafu {
                    operation: "begin batch",
                })?;

            match claim {
                BatchClaim::Claimed => {}
                BatchClaim::InProgress => {
                    debug!(import_id = %import_id, batch_id, "Batch is already being ingested");
                    return BatchInProgressSnafu {
                        import_id,
                        batch_id,
                    }
                    .fail();
                }
                BatchClaim::Recorded(counts) => {
                    debug!(import_id = %import_id, batch_id, "Batch already accounted for");
                    if request.is_last_batch {
                        self.finish_import(&import).await?;
                    }
                    return Ok(BatchOutcome {
                        counts,
                        replayed: true,
                    });
                }
            }
        }

        let counts = match self.ingest_batch(&import, &request).await {
            Ok(counts) => counts,
            Err(err) => {
                if let Some(batch_id) = request.batch_id.as_deref() {
                    self.release_batch(import_id, batch_id).await;
                }
                return Err(err);
            }
        };

        self.metrics.imported_events.add(counts.imported, &[]);
        self.metrics.skipped_events.add(counts.skipped, &[]);
        self.metrics.invalid_events.add(counts.invalid, &[]);

        debug!(
            import_id = %import_id,
            imported = counts.imported,
            skipped = counts.skipped,
            invalid = counts.invalid,
            "Batch accounted for"
        );

        if request.is_last_batch {
            self.finish_import(&import).await?;
        }

        Ok(BatchOutcome {
            counts,
            replayed: false,
        })
    }

    /// Transform, filter, write and account one batch.
    ///
    /// The caller holds the claim on the request's batch id, if any.
    async fn ingest_batch(
        &self,
        import: &Import,
        request: &SubmitBatchRequest,
    ) -> Result<BatchCounts> {
        let import_id = import.import_id;
        let platform = self.resolve_platform(import, &request.events).await?;
        let mapper = self
            .platforms
            .mapper(platform)
            .context(UnsupportedPlatformSnafu { platform })?;

        let target = EventTarget {
            site: import.site.clone(),
            import_id,
            batch_id: request.batch_id.clone(),
        };
        let transformed = mapper.transform(&request.events, &target);
        let invalid = (request.events.len() - transformed.len()) as u64;

        let tracker = self
            .quota_cache
            .get(&import.organization)
            .await
            .context(QuotaSnafu {})?;

        let (admitted, skipped): (Vec<_>, Vec<_>) = transformed
            .into_iter()
            .partition(|event| tracker.admit(event.timestamp));

        let counts = BatchCounts::new(admitted.len() as u64, skipped.len() as u64, invalid);

        if let Some(batch_id) = request.batch_id.as_deref() {
            // Rows left behind by an earlier attempt whose accounting failed.
            self.events
                .delete_batch_events(&import.site, import_id, batch_id)
                .await
                .context(EventStoreSnafu {
                    operation: "delete batch events",
                })?;
        }

        if !admitted.is_empty() {
            if let Err(err) = self.events.insert_events(admitted).await {
                warn!(import_id = %import_id, err = %err, "Failed to write batch events");
                return Err(err).context(EventStoreSnafu {
                    operation: "insert events",
                });
            }
        }

        let mut progress = BatchProgress::new(counts);
        if let Some(batch_id) = request.batch_id.clone() {
            progress = progress.with_batch_id(batch_id);
        }

        if let Err(err) = self.metadata.record_batch(import_id, progress).await {
            warn!(
                import_id = %import_id,
                err = %err,
                "Wrote batch events but failed to account for them"
            );
            return Err(err).context(ImportMetadataSnafu {
                operation: "record batch",
            });
        }

        Ok(counts)
    }

    /// Drop the claim on a batch id after a failed attempt.
    async fn release_batch(&self, import_id: ImportId, batch_id: &str) {
        if let Err(err) = self.metadata.release_batch(import_id, batch_id).await {
            error!(
                import_id = %import_id,
                batch_id,
                err = %err,
                "Failed to release batch claim"
            );
        }
    }

    /// Delete a completed import together with its events.
    pub async fn delete_import(
        &self,
        caller: &Caller,
        site: &SiteName,
        import_id: ImportId,
    ) -> Result<DeletedImport> {
        self.authorize(caller, site).await?;

        let import = self.load_import(site, import_id).await?;
        ensure!(import.is_completed(), StillActiveSnafu { import_id });

        let deleted_events = self
            .events
            .delete_import_events(&import.site, import_id)
            .await
            .context(DeleteEventsSnafu { import_id })?;

        if let Err(err) = self.metadata.delete_import(import_id).await {
            error!(
                import_id = %import_id,
                deleted_events,
                err = %err,
                "Deleted import events but failed to delete the import"
            );
            return Err(err).context(DeleteMetadataSnafu { import_id });
        }

        self.gate.complete(&import.organization, import_id);
        self.quota_cache.invalidate(&import.organization).await;
        self.metrics.deleted.add(1, &[]);

        info!(import_id = %import_id, site = %import.site, deleted_events, "Import deleted");

        Ok(DeletedImport {
            import,
            deleted_events,
        })
    }

    pub async fn get_import(
        &self,
        caller: &Caller,
        site: &SiteName,
        import_id: ImportId,
    ) -> Result<Import> {
        self.authorize(caller, site).await?;
        self.load_import(site, import_id).await
    }

    /// List the site's imports, most recent first.
    pub async fn list_imports(
        &self,
        caller: &Caller,
        request: ListImportsRequest,
    ) -> Result<ListImportsResponse> {
        if let Some(page_size) = request.page_size {
            ensure!(
                (1..=MAX_LIST_PAGE_SIZE).contains(&page_size),
                ValidationSnafu {
                    message: format!("page size must be between 1 and {MAX_LIST_PAGE_SIZE}"),
                }
            );
        }

        self.authorize(caller, &request.site).await?;
        self.resolve_site(&request.site).await?;

        self.metadata
            .list_imports(request)
            .await
            .context(ImportMetadataSnafu {
                operation: "list imports",
            })
    }

    async fn authorize(&self, caller: &Caller, site: &SiteName) -> Result<()> {
        if self.authorizer.has_admin_access(caller, site).await {
            return Ok(());
        }

        ForbiddenSnafu {
            caller: caller.as_str(),
            site: site.clone(),
        }
        .fail()
    }

    async fn resolve_site(&self, site: &SiteName) -> Result<Site> {
        match self.sites.get_site(site.clone()).await {
            Ok(site) => Ok(site),
            Err(err) if err.is_not_found() => {
                Err(err).context(SiteNotFoundSnafu { site: site.clone() })
            }
            Err(err) => Err(err).context(SiteDirectorySnafu { site: site.clone() }),
        }
    }

    async fn load_import(&self, site: &SiteName, import_id: ImportId) -> Result<Import> {
        let import = match self.metadata.get_import(import_id).await {
            Ok(import) => import,
            Err(err) if err.is_not_found() => return ImportNotFoundSnafu { import_id }.fail(),
            Err(err) => {
                return Err(err).context(ImportMetadataSnafu {
                    operation: "get import",
                });
            }
        };

        ensure!(
            &import.site == site,
            WrongSiteSnafu {
                import_id,
                site: site.clone(),
            }
        );

        Ok(import)
    }

    /// The import's platform, detected from the first row if not yet stored.
    async fn resolve_platform(&self, import: &Import, events: &[Value]) -> Result<Platform> {
        if let Some(platform) = import.platform {
            return Ok(platform);
        }

        let Some(platform) = events.first().and_then(|event| self.platforms.detect(event)) else {
            return UnrecognizedFormatSnafu {
                message: "the first event matches no supported platform",
            }
            .fail();
        };

        let stored = self
            .metadata
            .set_platform(import.import_id, platform)
            .await
            .context(ImportMetadataSnafu {
                operation: "set platform",
            })?;

        info!(import_id = %import.import_id, platform = %platform, "Detected import platform");

        Ok(stored.platform.unwrap_or(platform))
    }

    /// Mark the import completed and release its concurrency slot.
    async fn finish_import(&self, import: &Import) -> Result<Import> {
        let completed = self
            .metadata
            .finalize(import.import_id, Utc::now())
            .await
            .context(ImportMetadataSnafu {
                operation: "finalize import",
            })?;

        self.gate.complete(&import.organization, import.import_id);
        self.metrics.completed.add(1, &[]);

        info!(
            import_id = %completed.import_id,
            imported = completed.imported_events,
            skipped = completed.skipped_events,
            invalid = completed.invalid_events,
            "Import completed"
        );

        Ok(completed)
    }
}
