//! Access level tags declared by webservices.
//!
//! The identifiers are part of the wire contract between webservice
//! configuration and strategy selection and must stay stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    /// Any authenticated caller.
    Connected,
    /// The caller may only touch rows they own.
    Owner,
    /// Any caller holding a role-based grant.
    Role,
    /// Any caller holding an organization-scoped grant.
    OrganizationRole,
    /// A trusted internal service.
    InternalService,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Connected,
        AccessLevel::Owner,
        AccessLevel::Role,
        AccessLevel::OrganizationRole,
        AccessLevel::InternalService,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AccessLevel::Connected => "CONNECTED",
            AccessLevel::Owner => "OWNER",
            AccessLevel::Role => "ROLE",
            AccessLevel::OrganizationRole => "ORGANIZATION_ROLE",
            AccessLevel::InternalService => "INTERNAL_SERVICE",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessLevel::ALL
            .into_iter()
            .find(|level| level.id() == s)
            .ok_or_else(|| format!("Unknown access level: {}", s))
    }
}

/// Public webservice flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicType {
    /// Reachable by anyone.
    NoLimitation,
    /// Reachable only by callers without access claims (login, sign-up).
    Disconnected,
}
