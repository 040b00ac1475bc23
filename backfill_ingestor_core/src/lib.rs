//! Admission control and batch ingestion of historical event imports.

pub mod authz;
pub mod batch;
pub mod error;
pub mod metrics;
pub mod options;
pub mod platform;
pub mod service;
pub mod sweeper;

pub use authz::{AllowAllAuthorizer, Authorizer, Caller, StaticAuthorizer};
pub use batch::{AllowedDateRange, BatchOutcome, CreatedImport, DeletedImport, SubmitBatchRequest};
pub use error::{ImportError, Result};
pub use options::ImportOptions;
pub use service::ImportService;
pub use sweeper::{SweepReport, Sweeper, SweeperOptions, run_background_sweeper};
