use backfill_resources::ImportId;
use snafu::Snafu;

/// Errors related to import metadata operations.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum ImportMetadataError {
    #[snafu(display("import not found: {import_id}"))]
    NotFound { import_id: ImportId },
    #[snafu(display("import already exists: {import_id}"))]
    AlreadyExists { import_id: ImportId },
    #[snafu(display("batch {batch_id} of import {import_id} was already recorded"))]
    DuplicateBatch { import_id: ImportId, batch_id: String },
    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument { message: String },
    #[snafu(display("internal error: {message}"))]
    Internal { message: String },
}

pub type Result<T, E = ImportMetadataError> = ::std::result::Result<T, E>;

impl ImportMetadataError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ImportMetadataError::NotFound { .. })
    }

    pub fn is_duplicate_batch(&self) -> bool {
        matches!(self, ImportMetadataError::DuplicateBatch { .. })
    }
}
