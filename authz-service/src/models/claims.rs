//! Token payloads: end-user access claims and service identity claims.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Scope granted on a webservice by a flat claim. Ordered so that the
/// broader scope compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebserviceScope {
    Owner,
    Full,
}

/// Webservices reachable at one organization's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationGrant {
    pub level: String,
    pub webservices: BTreeSet<String>,
}

impl OrganizationGrant {
    pub fn new<I, S>(level: impl Into<String>, webservices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            level: level.into(),
            webservices: webservices.into_iter().map(Into::into).collect(),
        }
    }
}

/// Access grants carried by a user token. Immutable once issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default)]
    pub is_super_user: bool,
    #[serde(default)]
    pub webservices: BTreeMap<String, WebserviceScope>,
    #[serde(default)]
    pub organizations: BTreeMap<String, OrganizationGrant>,
}

impl AccessClaims {
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            ..Default::default()
        }
    }

    pub fn super_user(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            is_super_user: true,
            ..Default::default()
        }
    }

    /// Grant `scope` on `webservice`, keeping any broader scope already held.
    pub fn grant_webservice(&mut self, webservice: impl Into<String>, scope: WebserviceScope) {
        let entry = self.webservices.entry(webservice.into()).or_insert(scope);
        if scope > *entry {
            *entry = scope;
        }
    }

    pub fn with_webservice(mut self, webservice: impl Into<String>, scope: WebserviceScope) -> Self {
        self.grant_webservice(webservice, scope);
        self
    }

    pub fn with_organization(mut self, org_id: impl Into<String>, grant: OrganizationGrant) -> Self {
        self.organizations.insert(org_id.into(), grant);
        self
    }

    /// Merge organization grants from ownership and from role assignments.
    ///
    /// Role grants are unioned into what is already held. An owner grant
    /// replaces the entry for its organization outright.
    pub fn merge_organizations(
        &mut self,
        owner: BTreeMap<String, OrganizationGrant>,
        role: BTreeMap<String, OrganizationGrant>,
    ) {
        for (org_id, grant) in role {
            match self.organizations.get_mut(&org_id) {
                Some(existing) if existing.level == grant.level => {
                    existing.webservices.extend(grant.webservices);
                }
                _ => {
                    self.organizations.insert(org_id, grant);
                }
            }
        }

        for (org_id, grant) in owner {
            self.organizations.insert(org_id, grant);
        }
    }

    pub fn webservice_scope(&self, webservice: &str) -> Option<WebserviceScope> {
        self.webservices.get(webservice).copied()
    }
}

/// Signed access token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(flatten)]
    pub claims: AccessClaims,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Double-submit anti-forgery value, echoed by the transport layer.
    pub xsrf_token: String,
}

pub const SERVICE_TOKEN_TYPE: &str = "service";

/// Signed service-to-service token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTokenClaims {
    #[serde(rename = "type")]
    pub token_type: String,
    pub service_name: String,
    pub instance_id: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Decoded internal caller. Trust is binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub service_name: String,
    pub instance_id: String,
}

impl From<ServiceTokenClaims> for ServiceIdentity {
    fn from(claims: ServiceTokenClaims) -> Self {
        Self {
            service_name: claims.service_name,
            instance_id: claims.instance_id,
        }
    }
}
