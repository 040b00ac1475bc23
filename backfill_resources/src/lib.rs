//! Resource types shared by the import control plane and ingestor.

pub mod name;

mod event;
mod import;
mod organization;
mod site;

pub use self::event::ImportedEvent;
pub use self::import::{BatchCounts, Import, ImportId, ImportStatus, Platform};
pub use self::name::{ResourceError, ResourceResult, validate_resource_id};
pub use self::organization::{Organization, OrganizationName};
pub use self::site::{Site, SiteName};
