//! Capability declaration implemented by protected entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::organization::AccessingOrganizations;
use super::statement::{Predicate, Statement};

/// Who may access one loaded instance. Implementations must be pure.
pub trait AccessControlled {
    /// Users owning this row by identity.
    fn accessing_users(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Organizations owning this row, ancestors included.
    fn accessing_organizations(&self) -> AccessingOrganizations {
        AccessingOrganizations::new()
    }
}

/// Query-side half of the declaration: how an entity type turns a scope
/// into predicates on a statement.
pub trait EntityDescriptor: Send + Sync {
    fn entity_name(&self) -> &str;

    /// Predicates matching rows owned by `user_id`. Empty means the entity
    /// has no per-user ownership, so the owner scope unlocks nothing.
    fn user_accessing_filters(&self, _statement: &mut Statement, _user_id: &str) -> Vec<Predicate> {
        Vec::new()
    }

    /// Predicates matching rows owned by any of `orgs`.
    ///
    /// `None` means the entity is not organization-scoped.
    fn organization_accessing_filters(
        &self,
        _statement: &mut Statement,
        _orgs: &AccessingOrganizations,
    ) -> Option<Vec<Predicate>> {
        None
    }
}

/// Descriptor for the common shape: optionally owned by a user, optionally
/// owned by organizations of the listed kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedEntity {
    pub name: String,
    #[serde(default)]
    pub user_owned: bool,
    #[serde(default)]
    pub organization_kinds: Vec<String>,
}

impl ScopedEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_owned: false,
            organization_kinds: Vec::new(),
        }
    }

    pub fn user_owned(mut self) -> Self {
        self.user_owned = true;
        self
    }

    pub fn owned_by(mut self, kind: impl Into<String>) -> Self {
        self.organization_kinds.push(kind.into());
        self
    }
}

impl EntityDescriptor for ScopedEntity {
    fn entity_name(&self) -> &str {
        &self.name
    }

    fn user_accessing_filters(&self, _statement: &mut Statement, user_id: &str) -> Vec<Predicate> {
        if self.user_owned {
            vec![Predicate::user_in([user_id])]
        } else {
            Vec::new()
        }
    }

    fn organization_accessing_filters(
        &self,
        statement: &mut Statement,
        orgs: &AccessingOrganizations,
    ) -> Option<Vec<Predicate>> {
        if self.organization_kinds.is_empty() {
            return None;
        }

        let mut predicates = Vec::new();
        for kind in &self.organization_kinds {
            if let Some(ids) = orgs.get(kind).filter(|ids| !ids.is_empty()) {
                statement.join(kind.clone());
                predicates.push(Predicate::organization_in(kind.clone(), ids.iter().cloned()));
            }
        }
        Some(predicates)
    }
}

/// The capability tuple of a loaded instance, as a plain value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityTuple {
    #[serde(default)]
    pub users: BTreeSet<String>,
    #[serde(default)]
    pub organizations: AccessingOrganizations,
}

impl CapabilityTuple {
    pub fn owned_by_user(user_id: impl Into<String>) -> Self {
        Self {
            users: BTreeSet::from([user_id.into()]),
            organizations: AccessingOrganizations::new(),
        }
    }

    pub fn owned_by_organizations(organizations: AccessingOrganizations) -> Self {
        Self {
            users: BTreeSet::new(),
            organizations,
        }
    }
}

impl AccessControlled for CapabilityTuple {
    fn accessing_users(&self) -> BTreeSet<String> {
        self.users.clone()
    }

    fn accessing_organizations(&self) -> AccessingOrganizations {
        self.organizations.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_organization_scoped_returns_none() {
        let entity = ScopedEntity::new("note").user_owned();
        let mut statement = Statement::new("note");
        let orgs = AccessingOrganizations::new().with("client", "A");
        assert!(entity.organization_accessing_filters(&mut statement, &orgs).is_none());
        assert_eq!(
            entity.user_accessing_filters(&mut statement, "u1"),
            vec![Predicate::user_in(["u1"])]
        );
    }

    #[test]
    fn test_organization_filters_join_matching_kinds_only() {
        let entity = ScopedEntity::new("invoice").owned_by("client").owned_by("company");
        let mut statement = Statement::new("invoice");
        let orgs = AccessingOrganizations::new().with("client", "A").with("site", "S");

        let predicates = entity
            .organization_accessing_filters(&mut statement, &orgs)
            .unwrap();

        assert_eq!(predicates, vec![Predicate::organization_in("client", ["A"])]);
        assert_eq!(statement.joins, vec!["client".to_string()]);
    }

    #[test]
    fn test_default_user_filters_are_empty() {
        let entity = ScopedEntity::new("invoice").owned_by("client");
        let mut statement = Statement::new("invoice");
        assert!(entity.user_accessing_filters(&mut statement, "u1").is_empty());
    }
}
