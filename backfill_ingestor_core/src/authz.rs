//! Authorization of callers against sites.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use async_trait::async_trait;
use backfill_resources::SiteName;

/// Identity of the authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller(String);

impl Caller {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether the caller may manage the site's imports.
    async fn has_admin_access(&self, caller: &Caller, site: &SiteName) -> bool;
}

/// Grants every caller access to every site.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn has_admin_access(&self, _caller: &Caller, _site: &SiteName) -> bool {
        true
    }
}

/// Grants access from a fixed list of `(caller, site)` pairs.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    grants: HashMap<Caller, HashSet<SiteName>>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grant(mut self, caller: Caller, site: SiteName) -> Self {
        self.grants.entry(caller).or_default().insert(site);
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn has_admin_access(&self, caller: &Caller, site: &SiteName) -> bool {
        self.grants
            .get(caller)
            .is_some_and(|sites| sites.contains(site))
    }
}
