//! Lookups the claims builder and live sub-checks depend on.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use crate::models::{OrgRef, OrganizationGrant};

/// The principal a token is being issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub is_super_user: bool,
}

impl Principal {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_super_user: false,
        }
    }

    pub fn super_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_super_user: true,
        }
    }
}

/// Read-only view of roles, organization memberships and licensing.
#[async_trait]
pub trait AccessDirectory: Send + Sync {
    /// Webservices reachable through the user's enabled global roles.
    async fn role_webservices(&self, user_id: &str) -> Result<BTreeSet<String>, anyhow::Error>;

    /// Organizations the user owns.
    async fn owned_organizations(&self, user_id: &str) -> Result<Vec<OrgRef>, anyhow::Error>;

    /// Per organization id, the webservices granted by the user's roles
    /// inside that organization.
    async fn organization_role_webservices(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<String, OrganizationGrant>, anyhow::Error>;

    async fn has_active_subscription(&self, org: &OrgRef) -> Result<bool, anyhow::Error>;

    /// Whether the user occupies a license seat in `org`.
    async fn holds_license(&self, user_id: &str, org: &OrgRef) -> Result<bool, anyhow::Error>;
}

#[derive(Default)]
struct DirectoryData {
    role_webservices: HashMap<String, BTreeSet<String>>,
    owned: HashMap<String, Vec<OrgRef>>,
    organization_roles: HashMap<String, BTreeMap<String, OrganizationGrant>>,
    subscriptions: HashSet<OrgRef>,
    licenses: HashSet<(String, OrgRef)>,
    unavailable: bool,
    latency: Option<Duration>,
}

/// In-memory directory used by tests and local runs.
#[derive(Default)]
pub struct InMemoryAccessDirectory {
    data: RwLock<DirectoryData>,
}

impl InMemoryAccessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(self, f: impl FnOnce(&mut DirectoryData)) -> Self {
        if let Ok(mut data) = self.data.write() {
            f(&mut data);
        }
        self
    }

    pub fn with_role_webservices<I, S>(self, user_id: &str, webservices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let webservices: BTreeSet<String> = webservices.into_iter().map(Into::into).collect();
        self.update(|d| {
            d.role_webservices
                .entry(user_id.to_string())
                .or_default()
                .extend(webservices)
        })
    }

    pub fn with_owned_organization(self, user_id: &str, org: OrgRef) -> Self {
        self.update(|d| d.owned.entry(user_id.to_string()).or_default().push(org))
    }

    pub fn with_organization_role(self, user_id: &str, org_id: &str, grant: OrganizationGrant) -> Self {
        self.update(|d| {
            d.organization_roles
                .entry(user_id.to_string())
                .or_default()
                .insert(org_id.to_string(), grant);
        })
    }

    pub fn with_subscription(self, org: OrgRef) -> Self {
        self.update(|d| {
            d.subscriptions.insert(org);
        })
    }

    pub fn with_license(self, user_id: &str, org: OrgRef) -> Self {
        self.update(|d| {
            d.licenses.insert((user_id.to_string(), org));
        })
    }

    /// Every lookup fails while set.
    pub fn with_outage(self) -> Self {
        self.update(|d| d.unavailable = true)
    }

    /// Delay subscription lookups.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.update(|d| d.latency = Some(latency))
    }

    pub fn set_subscription(&self, org: OrgRef, active: bool) -> Result<(), anyhow::Error> {
        let mut data = self
            .data
            .write()
            .map_err(|e| anyhow::anyhow!("Access directory lock poisoned: {}", e))?;
        if active {
            data.subscriptions.insert(org);
        } else {
            data.subscriptions.remove(&org);
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&DirectoryData) -> T) -> Result<T, anyhow::Error> {
        let data = self
            .data
            .read()
            .map_err(|e| anyhow::anyhow!("Access directory lock poisoned: {}", e))?;
        if data.unavailable {
            return Err(anyhow::anyhow!("Access directory unavailable"));
        }
        Ok(f(&data))
    }
}

#[async_trait]
impl AccessDirectory for InMemoryAccessDirectory {
    async fn role_webservices(&self, user_id: &str) -> Result<BTreeSet<String>, anyhow::Error> {
        self.read(|d| d.role_webservices.get(user_id).cloned().unwrap_or_default())
    }

    async fn owned_organizations(&self, user_id: &str) -> Result<Vec<OrgRef>, anyhow::Error> {
        self.read(|d| d.owned.get(user_id).cloned().unwrap_or_default())
    }

    async fn organization_role_webservices(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<String, OrganizationGrant>, anyhow::Error> {
        self.read(|d| d.organization_roles.get(user_id).cloned().unwrap_or_default())
    }

    async fn has_active_subscription(&self, org: &OrgRef) -> Result<bool, anyhow::Error> {
        let latency = self.read(|d| d.latency)?;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.read(|d| d.subscriptions.contains(org))
    }

    async fn holds_license(&self, user_id: &str, org: &OrgRef) -> Result<bool, anyhow::Error> {
        self.read(|d| d.licenses.contains(&(user_id.to_string(), org.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outage_fails_every_lookup() {
        let directory = InMemoryAccessDirectory::new()
            .with_role_webservices("u1", ["X"])
            .with_outage();
        assert!(directory.role_webservices("u1").await.is_err());
        assert!(directory
            .has_active_subscription(&OrgRef::new("client", "A"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_subscription_toggle() -> Result<(), anyhow::Error> {
        let org = OrgRef::new("client", "A");
        let directory = InMemoryAccessDirectory::new().with_subscription(org.clone());
        assert!(directory.has_active_subscription(&org).await?);

        directory.set_subscription(org.clone(), false)?;
        assert!(!directory.has_active_subscription(&org).await?);
        Ok(())
    }
}
