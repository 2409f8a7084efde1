//! Organization hierarchy resolution.
//!
//! Walks parent links upward from an organization and reports every level
//! it passed through. Cycles, excessive depth and failed lookups are errors;
//! a failed lookup is never read as "no parent".

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use crate::models::{AccessingOrganizations, OrgRef};

pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("cycle detected in organization hierarchy at {0}")]
    Cycle(OrgRef),

    #[error("organization hierarchy deeper than {max_depth} levels at {org}")]
    TooDeep { org: OrgRef, max_depth: usize },

    #[error("failed to resolve parent of {org}: {source}")]
    Lookup {
        org: OrgRef,
        #[source]
        source: anyhow::Error,
    },
}

/// Read-only access to parent links.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// `Ok(None)` for a root organization. Unknown organizations are errors.
    async fn parent_of(&self, org: &OrgRef) -> Result<Option<OrgRef>, anyhow::Error>;
}

/// In-memory directory for tests and static deployments.
#[derive(Default)]
pub struct InMemoryOrganizationDirectory {
    parents: RwLock<HashMap<OrgRef, Option<OrgRef>>>,
}

impl InMemoryOrganizationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, org: OrgRef, parent: Option<OrgRef>) -> Result<(), anyhow::Error> {
        self.parents
            .write()
            .map_err(|e| anyhow::anyhow!("Organization directory lock poisoned: {}", e))?
            .insert(org, parent);
        Ok(())
    }

    pub fn with_root(mut self, org: OrgRef) -> Self {
        self.parents_mut().insert(org, None);
        self
    }

    pub fn with_child(mut self, org: OrgRef, parent: OrgRef) -> Self {
        self.parents_mut().insert(org, Some(parent));
        self
    }

    /// Exclusive access, so a poisoned lock is cleared rather than skipped.
    fn parents_mut(&mut self) -> &mut HashMap<OrgRef, Option<OrgRef>> {
        self.parents.clear_poison();
        self.parents.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl OrganizationDirectory for InMemoryOrganizationDirectory {
    async fn parent_of(&self, org: &OrgRef) -> Result<Option<OrgRef>, anyhow::Error> {
        self.parents
            .read()
            .map_err(|e| anyhow::anyhow!("Organization directory lock poisoned: {}", e))?
            .get(org)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Unknown organization {}", org))
    }
}

/// Levels from the starting organization (first) up to the root (last).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationLineage {
    levels: Vec<OrgRef>,
}

impl OrganizationLineage {
    pub fn levels(&self) -> &[OrgRef] {
        &self.levels
    }

    /// Union of all levels. Authorization checks match against this.
    pub fn closure(&self) -> AccessingOrganizations {
        self.levels.iter().cloned().collect()
    }

    /// One entry per kind where the closest level wins. For display and
    /// lookup only, never for authorization.
    pub fn display_map(&self) -> AccessingOrganizations {
        let mut map = AccessingOrganizations::new();
        for org in self.levels.iter().rev() {
            map.set(org.kind.clone(), [org.id.clone()].into_iter().collect());
        }
        map
    }
}

#[derive(Clone)]
pub struct HierarchyResolver {
    directory: Arc<dyn OrganizationDirectory>,
    max_depth: usize,
}

impl HierarchyResolver {
    pub fn new(directory: Arc<dyn OrganizationDirectory>, max_depth: usize) -> Self {
        Self {
            directory,
            max_depth,
        }
    }

    #[tracing::instrument(skip(self), fields(org = %start))]
    pub async fn lineage(&self, start: &OrgRef) -> Result<OrganizationLineage, HierarchyError> {
        let mut levels = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(start.clone());

        while let Some(org) = current {
            if !visited.insert(org.clone()) {
                tracing::error!(org = %org, "Organization hierarchy contains a cycle");
                return Err(HierarchyError::Cycle(org));
            }
            if levels.len() >= self.max_depth {
                return Err(HierarchyError::TooDeep {
                    org,
                    max_depth: self.max_depth,
                });
            }

            current = self
                .directory
                .parent_of(&org)
                .await
                .map_err(|source| HierarchyError::Lookup {
                    org: org.clone(),
                    source,
                })?;
            levels.push(org);
        }

        Ok(OrganizationLineage { levels })
    }

    /// Ancestor closure of `org`, itself included.
    pub async fn accessing_organizations(
        &self,
        org: &OrgRef,
    ) -> Result<AccessingOrganizations, HierarchyError> {
        Ok(self.lineage(org).await?.closure())
    }
}
