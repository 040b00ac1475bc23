//! In-memory implementation of the import metadata store.
//!
//! All records live behind a single `RwLock`. Every mutation happens under the
//! write lock, which makes counter increments atomic with respect to each
//! other.

use std::collections::HashMap;

use async_trait::async_trait;
use backfill_resources::{BatchCounts, Import, ImportId, Platform};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    BatchClaim, BatchProgress, ImportMetadata, ImportMetadataError, ListImportsRequest,
    ListImportsResponse, Result,
};

#[derive(Debug, Clone, Copy)]
enum BatchState {
    Pending,
    Recorded(BatchCounts),
}

#[derive(Debug)]
struct ImportEntry {
    import: Import,
    /// Batches by idempotency token.
    batches: HashMap<String, BatchState>,
}

#[derive(Debug, Default)]
pub struct InMemoryImportMetadata {
    imports: RwLock<HashMap<ImportId, ImportEntry>>,
}

impl InMemoryImportMetadata {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(import_id: ImportId) -> ImportMetadataError {
    ImportMetadataError::NotFound { import_id }
}

#[async_trait]
impl ImportMetadata for InMemoryImportMetadata {
    async fn create_import(&self, import: Import) -> Result<Import> {
        let mut imports = self.imports.write().await;

        if imports.contains_key(&import.import_id) {
            return Err(ImportMetadataError::AlreadyExists {
                import_id: import.import_id,
            });
        }

        imports.insert(
            import.import_id,
            ImportEntry {
                import: import.clone(),
                batches: HashMap::new(),
            },
        );

        Ok(import)
    }

    async fn get_import(&self, import_id: ImportId) -> Result<Import> {
        let imports = self.imports.read().await;
        imports
            .get(&import_id)
            .map(|entry| entry.import.clone())
            .ok_or_else(|| not_found(import_id))
    }

    async fn list_imports(&self, request: ListImportsRequest) -> Result<ListImportsResponse> {
        let page_size = request.page_size.unwrap_or(100).clamp(1, 1000);

        let imports = self.imports.read().await;
        let mut site_imports: Vec<&Import> = imports
            .values()
            .map(|entry| &entry.import)
            .filter(|import| import.site == request.site)
            .collect();

        // Most recent first. Ids are time-ordered, so they break ties.
        site_imports.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.import_id.cmp(&a.import_id))
        });

        let start_index = match request.page_token.as_deref() {
            None | Some("") => 0,
            Some(token) => {
                let token = ImportId::parse(token).map_err(|_| {
                    ImportMetadataError::InvalidArgument {
                        message: format!("invalid page token: {token}"),
                    }
                })?;
                site_imports
                    .iter()
                    .position(|import| import.import_id == token)
                    .map(|pos| pos + 1)
                    .unwrap_or(site_imports.len())
            }
        };

        let end_index = (start_index + page_size).min(site_imports.len());
        let page: Vec<Import> = site_imports[start_index..end_index]
            .iter()
            .map(|import| (*import).clone())
            .collect();

        let next_page_token = if end_index < site_imports.len() {
            page.last().map(|import| import.import_id.to_string())
        } else {
            None
        };

        Ok(ListImportsResponse {
            imports: page,
            next_page_token,
        })
    }

    async fn set_platform(&self, import_id: ImportId, platform: Platform) -> Result<Import> {
        let mut imports = self.imports.write().await;
        let entry = imports.get_mut(&import_id).ok_or_else(|| not_found(import_id))?;

        if entry.import.platform.is_none() {
            entry.import.platform = Some(platform);
        }

        Ok(entry.import.clone())
    }

    async fn record_batch(&self, import_id: ImportId, progress: BatchProgress) -> Result<Import> {
        let mut imports = self.imports.write().await;
        let entry = imports.get_mut(&import_id).ok_or_else(|| not_found(import_id))?;

        if let Some(batch_id) = progress.batch_id {
            if let Some(BatchState::Recorded(_)) = entry.batches.get(&batch_id) {
                return Err(ImportMetadataError::DuplicateBatch {
                    import_id,
                    batch_id,
                });
            }
            entry
                .batches
                .insert(batch_id, BatchState::Recorded(progress.counts));
        }

        entry.import.apply_counts(progress.counts);

        Ok(entry.import.clone())
    }

    async fn begin_batch(&self, import_id: ImportId, batch_id: &str) -> Result<BatchClaim> {
        let mut imports = self.imports.write().await;
        let entry = imports.get_mut(&import_id).ok_or_else(|| not_found(import_id))?;

        let claim = match entry.batches.get(batch_id) {
            Some(BatchState::Recorded(counts)) => BatchClaim::Recorded(*counts),
            Some(BatchState::Pending) => BatchClaim::InProgress,
            None => {
                entry
                    .batches
                    .insert(batch_id.to_string(), BatchState::Pending);
                BatchClaim::Claimed
            }
        };

        Ok(claim)
    }

    async fn release_batch(&self, import_id: ImportId, batch_id: &str) -> Result<()> {
        let mut imports = self.imports.write().await;
        let entry = imports.get_mut(&import_id).ok_or_else(|| not_found(import_id))?;

        if let Some(BatchState::Pending) = entry.batches.get(batch_id) {
            entry.batches.remove(batch_id);
        }

        Ok(())
    }

    async fn finalize(&self, import_id: ImportId, completed_at: DateTime<Utc>) -> Result<Import> {
        let mut imports = self.imports.write().await;
        let entry = imports.get_mut(&import_id).ok_or_else(|| not_found(import_id))?;

        if entry.import.completed_at.is_none() {
            entry.import.completed_at = Some(completed_at);
        }

        Ok(entry.import.clone())
    }

    async fn delete_import(&self, import_id: ImportId) -> Result<()> {
        let mut imports = self.imports.write().await;
        imports
            .remove(&import_id)
            .map(|_| ())
            .ok_or_else(|| not_found(import_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use backfill_resources::{OrganizationName, SiteName};
    use chrono::Duration;

    use super::*;

    fn new_import(site: &str, started_at: DateTime<Utc>) -> Import {
        Import::new(
            ImportId::new(),
            SiteName::new_unchecked(site),
            OrganizationName::new_unchecked("acme"),
            started_at,
        )
    }

    #[tokio::test]
    async fn test_record_batch_applies_deltas() {
        let store = InMemoryImportMetadata::new();
        let import = store.create_import(new_import("blog", Utc::now())).await.unwrap();

        store
            .record_batch(import.import_id, BatchProgress::new(BatchCounts::new(70, 20, 10)))
            .await
            .unwrap();
        let updated = store
            .record_batch(import.import_id, BatchProgress::new(BatchCounts::new(5, 0, 1)))
            .await
            .unwrap();

        assert_eq!(updated.counts(), BatchCounts::new(75, 20, 11));
    }

    #[tokio::test]
    async fn test_concurrent_record_batch_loses_no_updates() {
        let store = Arc::new(InMemoryImportMetadata::new());
        let import = store.create_import(new_import("blog", Utc::now())).await.unwrap();

        let import_id = import.import_id;

        let mut tasks = Vec::new();
        for i in 0..50u64 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .record_batch(import_id, BatchProgress::new(BatchCounts::new(i, 1, 2)))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored = store.get_import(import_id).await.unwrap();
        assert_eq!(stored.counts(), BatchCounts::new((0..50).sum(), 50, 100));
    }

    #[tokio::test]
    async fn test_duplicate_batch_id_is_rejected() {
        let store = InMemoryImportMetadata::new();
        let import = store.create_import(new_import("blog", Utc::now())).await.unwrap();
        let progress = BatchProgress::new(BatchCounts::new(3, 0, 0)).with_batch_id("batch-1");

        store
            .record_batch(import.import_id, progress.clone())
            .await
            .unwrap();
        let err = store
            .record_batch(import.import_id, progress)
            .await
            .unwrap_err();
        assert!(err.is_duplicate_batch());

        let stored = store.get_import(import.import_id).await.unwrap();
        assert_eq!(stored.counts(), BatchCounts::new(3, 0, 0));
    }

    #[tokio::test]
    async fn test_batch_claims() {
        let store = InMemoryImportMetadata::new();
        let import = store.create_import(new_import("blog", Utc::now())).await.unwrap();
        let import_id = import.import_id;

        assert_eq!(
            store.begin_batch(import_id, "batch-1").await.unwrap(),
            BatchClaim::Claimed
        );
        assert_eq!(
            store.begin_batch(import_id, "batch-1").await.unwrap(),
            BatchClaim::InProgress
        );
        assert_eq!(
            store.begin_batch(import_id, "batch-2").await.unwrap(),
            BatchClaim::Claimed
        );

        // A released claim can be taken again.
        store.release_batch(import_id, "batch-2").await.unwrap();
        assert_eq!(
            store.begin_batch(import_id, "batch-2").await.unwrap(),
            BatchClaim::Claimed
        );

        let counts = BatchCounts::new(4, 1, 0);
        store
            .record_batch(import_id, BatchProgress::new(counts).with_batch_id("batch-1"))
            .await
            .unwrap();

        // Releasing a recorded batch keeps its counts.
        store.release_batch(import_id, "batch-1").await.unwrap();
        assert_eq!(
            store.begin_batch(import_id, "batch-1").await.unwrap(),
            BatchClaim::Recorded(counts)
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let store = Arc::new(InMemoryImportMetadata::new());
        let import = store.create_import(new_import("blog", Utc::now())).await.unwrap();
        let import_id = import.import_id;

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.begin_batch(import_id, "batch-1").await.unwrap()
            }));
        }

        let mut claimed = 0;
        for task in tasks {
            if task.await.unwrap() == BatchClaim::Claimed {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_platform_is_set_once() {
        let store = InMemoryImportMetadata::new();
        let import = store.create_import(new_import("blog", Utc::now())).await.unwrap();

        let first = store
            .set_platform(import.import_id, Platform::Umami)
            .await
            .unwrap();
        let second = store
            .set_platform(import.import_id, Platform::SimpleAnalytics)
            .await
            .unwrap();

        assert_eq!(first.platform, Some(Platform::Umami));
        assert_eq!(second.platform, Some(Platform::Umami));
    }

    #[tokio::test]
    async fn test_finalize_keeps_first_timestamp() {
        let store = InMemoryImportMetadata::new();
        let import = store.create_import(new_import("blog", Utc::now())).await.unwrap();
        let first = Utc::now();

        store.finalize(import.import_id, first).await.unwrap();
        let again = store
            .finalize(import.import_id, first + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(again.completed_at, Some(first));
    }

    #[tokio::test]
    async fn test_list_imports_is_paginated_most_recent_first() {
        let store = InMemoryImportMetadata::new();
        let now = Utc::now();

        let mut created = Vec::new();
        for minutes in 0..5 {
            let import = store
                .create_import(new_import("blog", now + Duration::minutes(minutes)))
                .await
                .unwrap();
            created.push(import.import_id);
        }
        store
            .create_import(new_import("shop", now))
            .await
            .unwrap();

        let site = SiteName::new_unchecked("blog");
        let first_page = store
            .list_imports(ListImportsRequest::new(site.clone()).with_page_size(3))
            .await
            .unwrap();
        assert_eq!(first_page.imports.len(), 3);
        assert_eq!(first_page.imports[0].import_id, created[4]);

        let token = first_page.next_page_token.expect("next page token");
        let second_page = store
            .list_imports(
                ListImportsRequest::new(site)
                    .with_page_size(3)
                    .with_page_token(token),
            )
            .await
            .unwrap();
        assert_eq!(second_page.imports.len(), 2);
        assert_eq!(second_page.imports[1].import_id, created[0]);
        assert!(second_page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_delete_import() {
        let store = InMemoryImportMetadata::new();
        let import = store.create_import(new_import("blog", Utc::now())).await.unwrap();

        store.delete_import(import.import_id).await.unwrap();

        assert!(store.get_import(import.import_id).await.unwrap_err().is_not_found());
        assert!(store.delete_import(import.import_id).await.unwrap_err().is_not_found());
    }
}
