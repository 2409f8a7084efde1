pub mod claims_builder;
pub mod directory;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod jwt;
pub mod registry;
pub mod service_token;

pub use claims_builder::{
    BaseIdentity, ClaimsBuilder, ClaimsContributor, LicensedOrganizations,
    OrganizationWebservices, RoleWebservices,
};
pub use directory::{AccessDirectory, InMemoryAccessDirectory, Principal};
pub use engine::AccessEngine;
pub use error::AuthzError;
pub use hierarchy::{
    HierarchyError, HierarchyResolver, InMemoryOrganizationDirectory, OrganizationDirectory,
    OrganizationLineage,
};
pub use jwt::JwtService;
pub use registry::{RegistrySnapshot, WebserviceRegistry};
pub use service_token::ServiceTokenService;
