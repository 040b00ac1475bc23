use crate::resource_type;

resource_type!(Organization, "organizations");

/// An organization.
///
/// Organizations own sites and are the boundary of every import limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    /// The organization name.
    pub name: OrganizationName,
}

impl Organization {
    /// Create a new organization with the given name.
    pub fn new(name: OrganizationName) -> Self {
        Self { name }
    }
}
