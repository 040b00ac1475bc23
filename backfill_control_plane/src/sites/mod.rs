//! Directory of organizations and the sites they own.

mod error;
mod memory;

use async_trait::async_trait;
use backfill_resources::{Organization, OrganizationName, Site, SiteName};

pub use self::error::{Result, SiteDirectoryError};
pub use self::memory::InMemorySiteDirectory;

/// Resolves sites to the organization that owns them.
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// Create a new organization.
    async fn create_organization(&self, name: OrganizationName) -> Result<Organization>;

    /// Create a new site owned by an existing organization.
    async fn create_site(&self, name: SiteName, organization: OrganizationName) -> Result<Site>;

    /// Return the specified site.
    async fn get_site(&self, name: SiteName) -> Result<Site>;
}
