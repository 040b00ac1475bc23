//! In-memory site directory, used in development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use backfill_resources::{Organization, OrganizationName, Site, SiteName};
use tokio::sync::RwLock;

use super::{Result, SiteDirectory, SiteDirectoryError};

#[derive(Debug, Default)]
struct SiteDirectoryStore {
    organizations: HashMap<OrganizationName, Organization>,
    sites: HashMap<SiteName, Site>,
}

#[derive(Debug, Default)]
pub struct InMemorySiteDirectory {
    store: RwLock<SiteDirectoryStore>,
}

impl InMemorySiteDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SiteDirectory for InMemorySiteDirectory {
    async fn create_organization(&self, name: OrganizationName) -> Result<Organization> {
        let mut store = self.store.write().await;

        if store.organizations.contains_key(&name) {
            return Err(SiteDirectoryError::AlreadyExists {
                resource: "organization",
                message: name.id().to_string(),
            });
        }

        let organization = Organization::new(name.clone());
        store.organizations.insert(name, organization.clone());

        Ok(organization)
    }

    async fn create_site(&self, name: SiteName, organization: OrganizationName) -> Result<Site> {
        let mut store = self.store.write().await;

        if !store.organizations.contains_key(&organization) {
            return Err(SiteDirectoryError::NotFound {
                resource: "organization",
                message: organization.id().to_string(),
            });
        }

        if store.sites.contains_key(&name) {
            return Err(SiteDirectoryError::AlreadyExists {
                resource: "site",
                message: name.id().to_string(),
            });
        }

        let site = Site::new(name.clone(), organization);
        store.sites.insert(name, site.clone());

        Ok(site)
    }

    async fn get_site(&self, name: SiteName) -> Result<Site> {
        let store = self.store.read().await;
        store
            .sites
            .get(&name)
            .cloned()
            .ok_or_else(|| SiteDirectoryError::NotFound {
                resource: "site",
                message: name.id().to_string(),
            })
    }
}
