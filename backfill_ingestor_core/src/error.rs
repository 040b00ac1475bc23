use backfill_control_plane::{
    ErrorKind, event_store::EventStoreError, import_metadata::ImportMetadataError,
    quota::QuotaError, sites::SiteDirectoryError,
};
use backfill_resources::{ImportId, OrganizationName, Platform, SiteName};
use snafu::Snafu;

/// Import error types.
///
/// The message associated with an error is forwarded to the client,
/// for this reason it should contain information that is useful to the user.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum ImportError {
    /// Validation error.
    ///
    /// The request is malformed and was rejected before any state change.
    #[snafu(display("validation error: {message}"))]
    Validation { message: String },
    #[snafu(display("caller {caller} may not manage imports of {site}"))]
    Forbidden { caller: String, site: SiteName },
    #[snafu(display("site not found: {site}"))]
    SiteNotFound {
        site: SiteName,
        source: SiteDirectoryError,
    },
    #[snafu(display("import not found: {import_id}"))]
    ImportNotFound { import_id: ImportId },
    #[snafu(display("import {import_id} does not belong to {site}"))]
    WrongSite { import_id: ImportId, site: SiteName },
    #[snafu(display("import {import_id} is already completed"))]
    AlreadyCompleted { import_id: ImportId },
    #[snafu(display("import {import_id} is still active"))]
    StillActive { import_id: ImportId },
    /// Another submission of the same batch id is being written.
    #[snafu(display("batch {batch_id} of import {import_id} is already being ingested"))]
    BatchInProgress { import_id: ImportId, batch_id: String },
    /// The organization reached its concurrent import limit.
    #[snafu(display(
        "{organization} already runs {max_concurrent_imports} concurrent import(s)"
    ))]
    ConcurrencyLimit {
        organization: OrganizationName,
        max_concurrent_imports: usize,
    },
    #[snafu(display("unrecognized event format: {message}"))]
    UnrecognizedFormat { message: String },
    #[snafu(display("no mapper registered for platform {platform}"))]
    UnsupportedPlatform { platform: Platform },
    #[snafu(display("failed import metadata operation {operation}"))]
    ImportMetadata {
        operation: &'static str,
        source: ImportMetadataError,
    },
    #[snafu(display("failed event store operation {operation}"))]
    EventStore {
        operation: &'static str,
        source: EventStoreError,
    },
    #[snafu(display("failed to resolve site {site}"))]
    SiteDirectory {
        site: SiteName,
        source: SiteDirectoryError,
    },
    #[snafu(display("failed to load quota"))]
    Quota { source: QuotaError },
    /// Deleting the import's events failed. Nothing was deleted.
    #[snafu(display("failed to delete events of import {import_id}"))]
    DeleteEvents {
        import_id: ImportId,
        source: EventStoreError,
    },
    /// The import's events were deleted but its record was not.
    #[snafu(display("deleted events of import {import_id} but failed to delete its record"))]
    DeleteMetadata {
        import_id: ImportId,
        source: ImportMetadataError,
    },
}

pub type Result<T, E = ImportError> = std::result::Result<T, E>;

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::Validation { .. } => ErrorKind::Validation,
            ImportError::Forbidden { .. } => ErrorKind::Forbidden,
            ImportError::SiteNotFound { .. } | ImportError::ImportNotFound { .. } => {
                ErrorKind::NotFound
            }
            ImportError::WrongSite { .. }
            | ImportError::AlreadyCompleted { .. }
            | ImportError::StillActive { .. }
            | ImportError::BatchInProgress { .. } => ErrorKind::Conflict,
            ImportError::ConcurrencyLimit { .. } => ErrorKind::RateLimited,
            ImportError::UnrecognizedFormat { .. } | ImportError::UnsupportedPlatform { .. } => {
                ErrorKind::UnrecognizedFormat
            }
            ImportError::ImportMetadata { source, .. } => match source {
                ImportMetadataError::NotFound { .. } => ErrorKind::NotFound,
                ImportMetadataError::InvalidArgument { .. } => ErrorKind::Validation,
                _ => ErrorKind::StoreFailure,
            },
            ImportError::EventStore { .. }
            | ImportError::SiteDirectory { .. }
            | ImportError::Quota { .. }
            | ImportError::DeleteEvents { .. }
            | ImportError::DeleteMetadata { .. } => ErrorKind::StoreFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Whether a deletion removed the events but left the record behind.
    pub fn is_partial_deletion(&self) -> bool {
        matches!(self, ImportError::DeleteMetadata { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_share_a_kind() {
        let import_id = ImportId::new();
        let site = SiteName::new_unchecked("blog");

        for err in [
            ImportError::WrongSite {
                import_id,
                site: site.clone(),
            },
            ImportError::AlreadyCompleted { import_id },
            ImportError::StillActive { import_id },
            ImportError::BatchInProgress {
                import_id,
                batch_id: "batch-1".to_string(),
            },
        ] {
            assert_eq!(err.kind(), ErrorKind::Conflict);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_store_failures_are_retryable() {
        let err = ImportError::EventStore {
            operation: "insert events",
            source: EventStoreError::Unavailable {
                message: "connection reset".to_string(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
        assert!(err.is_retryable());

        let err = ImportError::ConcurrencyLimit {
            organization: OrganizationName::new_unchecked("acme"),
            max_concurrent_imports: 1,
        };
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_partial_deletion_is_distinct() {
        let import_id = ImportId::new();
        let events = ImportError::DeleteEvents {
            import_id,
            source: EventStoreError::Unavailable {
                message: "timeout".to_string(),
            },
        };
        let metadata = ImportError::DeleteMetadata {
            import_id,
            source: ImportMetadataError::Internal {
                message: "timeout".to_string(),
            },
        };

        assert!(!events.is_partial_deletion());
        assert!(metadata.is_partial_deletion());
        assert_eq!(events.kind(), metadata.kind());
    }
}
