pub mod error_kind;
pub mod event_store;
pub mod gate;
pub mod import_metadata;
pub mod quota;
pub mod sites;

pub use error_kind::ErrorKind;
