//! HTTP server for historical event imports.
//!
//! The server is built using axum. Every request identifies its caller with
//! the `x-backfill-caller` header.

pub mod error;
pub mod imports;
pub mod types;

pub use error::{HttpIngestorError, Result};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use backfill_ingestor_core::ImportService;

use crate::imports::{
    create_import_handler, delete_import_handler, get_import_handler, list_imports_handler,
    submit_batch_handler,
};

/// Header carrying the authenticated caller identity.
pub const CALLER_HEADER: &str = "x-backfill-caller";

/// Request body budget per event of the largest accepted batch.
pub const BYTES_PER_EVENT: usize = 4 * 1024;

/// HTTP front end of the import service.
pub struct HttpIngestor {
    state: HttpIngestorState,
    max_body_size: usize,
}

#[derive(Clone)]
pub struct HttpIngestorState {
    service: ImportService,
}

impl HttpIngestor {
    /// Creates the ingestor with a body limit sized for the service's
    /// maximum batch size.
    pub fn new(service: ImportService) -> Self {
        let max_body_size = service.max_batch_size().saturating_mul(BYTES_PER_EVENT);
        let state = HttpIngestorState { service };
        Self {
            state,
            max_body_size,
        }
    }

    /// Overrides the maximum request body size, in bytes.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route(
                "/v1/sites/{site}/imports",
                post(create_import_handler).get(list_imports_handler),
            )
            .route(
                "/v1/sites/{site}/imports/{import}",
                get(get_import_handler).delete(delete_import_handler),
            )
            .route(
                "/v1/sites/{site}/imports/{import}/events",
                post(submit_batch_handler),
            )
            .layer(DefaultBodyLimit::max(self.max_body_size))
            .with_state(self.state)
    }
}
