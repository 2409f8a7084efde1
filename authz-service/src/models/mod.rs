pub mod access_level;
pub mod capability;
pub mod claims;
pub mod decision;
pub mod organization;
pub mod statement;
pub mod webservice;

pub use access_level::{AccessLevel, PublicType};
pub use capability::{AccessControlled, CapabilityTuple, EntityDescriptor, ScopedEntity};
pub use claims::{
    AccessClaims, AccessTokenClaims, OrganizationGrant, ServiceIdentity, ServiceTokenClaims,
    WebserviceScope, SERVICE_TOKEN_TYPE,
};
pub use decision::{AccessDecision, AccessScope, DenialReason, Grant};
pub use organization::{AccessingOrganizations, OrgRef};
pub use statement::{Field, Predicate, Statement};
pub use webservice::WebserviceConfig;
