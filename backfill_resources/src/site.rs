use crate::{organization::OrganizationName, resource_type};

resource_type!(Site, "sites");

/// A site, the target of imported events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// The site name.
    pub name: SiteName,
    /// The organization that owns the site.
    pub organization: OrganizationName,
}

impl Site {
    /// Create a new site owned by the given organization.
    pub fn new(name: SiteName, organization: OrganizationName) -> Self {
        Self { name, organization }
    }
}
