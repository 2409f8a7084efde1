//! Query statement and row-level predicates.
//!
//! The persistence layer owns execution. This module only describes the
//! filters to apply, as a serializable predicate tree that can also be
//! evaluated against an already-loaded instance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::{BitAnd, BitOr};

use super::capability::AccessControlled;

/// Row attribute a predicate tests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Users reported by `accessing_users()`.
    AccessingUser,
    /// Organizations of one kind reported by `accessing_organizations()`.
    AccessingOrganization(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    True,
    False,
    In {
        field: Field,
        values: BTreeSet<String>,
    },
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn is_in<I, S>(field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn user_in<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::is_in(Field::AccessingUser, users)
    }

    pub fn organization_in<I, S>(kind: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::is_in(Field::AccessingOrganization(kind.into()), ids)
    }

    /// OR of all predicates; `False` when empty.
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        predicates.into_iter().fold(Predicate::False, Predicate::or)
    }

    /// AND of all predicates; `True` when empty.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        predicates.into_iter().fold(Predicate::True, Predicate::and)
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::True, _) | (_, Predicate::True) => Predicate::True,
            (Predicate::False, p) | (p, Predicate::False) => p,
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (p, Predicate::Or(mut right)) => {
                right.insert(0, p);
                Predicate::Or(right)
            }
            (a, b) => Predicate::Or(vec![a, b]),
        }
    }

    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::False, _) | (_, Predicate::False) => Predicate::False,
            (Predicate::True, p) | (p, Predicate::True) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    /// Evaluate against a loaded instance.
    pub fn matches(&self, instance: &dyn AccessControlled) -> bool {
        match self {
            Predicate::True => true,
            Predicate::False => false,
            Predicate::In {
                field: Field::AccessingUser,
                values,
            } => !instance.accessing_users().is_disjoint(values),
            Predicate::In {
                field: Field::AccessingOrganization(kind),
                values,
            } => instance
                .accessing_organizations()
                .get(kind)
                .is_some_and(|ids| !ids.is_disjoint(values)),
            Predicate::Or(predicates) => predicates.iter().any(|p| p.matches(instance)),
            Predicate::And(predicates) => predicates.iter().all(|p| p.matches(instance)),
        }
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.or(rhs)
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

/// A list/search query under construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Predicate>,
}

impl Statement {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            joins: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Record a join once.
    pub fn join(&mut self, relation: impl Into<String>) {
        let relation = relation.into();
        if !self.joins.contains(&relation) {
            self.joins.push(relation);
        }
    }

    pub fn and_where(&mut self, predicate: Predicate) {
        if predicate != Predicate::True {
            self.filters.push(predicate);
        }
    }

    /// Conjunction of every filter.
    pub fn predicate(&self) -> Predicate {
        Predicate::all(self.filters.iter().cloned())
    }

    pub fn matches(&self, instance: &dyn AccessControlled) -> bool {
        self.filters.iter().all(|p| p.matches(instance))
    }
}
