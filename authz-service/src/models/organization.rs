//! Organization references and organization-id maps.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifies one organization node, e.g. `client/42` or `company/7`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrgRef {
    pub kind: String,
    pub id: String,
}

impl OrgRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for OrgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// `{kind: {id, ...}}`. Used both for what an entity reports as its owning
/// organizations and for the organization scope granted to a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessingOrganizations(BTreeMap<String, BTreeSet<String>>);

impl AccessingOrganizations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: impl Into<String>, id: impl Into<String>) {
        self.0.entry(kind.into()).or_default().insert(id.into());
    }

    pub fn with(mut self, kind: impl Into<String>, id: impl Into<String>) -> Self {
        self.insert(kind, id);
        self
    }

    /// Replace the ids recorded for `kind`.
    pub fn set(&mut self, kind: impl Into<String>, ids: BTreeSet<String>) {
        self.0.insert(kind.into(), ids);
    }

    pub fn get(&self, kind: &str) -> Option<&BTreeSet<String>> {
        self.0.get(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    pub fn contains(&self, kind: &str, id: &str) -> bool {
        self.0.get(kind).is_some_and(|ids| ids.contains(id))
    }

    /// True when both maps share at least one `(kind, id)` pair.
    pub fn intersects(&self, other: &AccessingOrganizations) -> bool {
        self.0.iter().any(|(kind, ids)| {
            other
                .0
                .get(kind)
                .is_some_and(|theirs| !ids.is_disjoint(theirs))
        })
    }

    /// Set union per kind.
    pub fn union(&mut self, other: &AccessingOrganizations) {
        for (kind, ids) in &other.0 {
            self.0
                .entry(kind.clone())
                .or_default()
                .extend(ids.iter().cloned());
        }
    }
}

impl FromIterator<OrgRef> for AccessingOrganizations {
    fn from_iter<T: IntoIterator<Item = OrgRef>>(iter: T) -> Self {
        let mut map = AccessingOrganizations::new();
        for org in iter {
            map.insert(org.kind, org.id);
        }
        map
    }
}
