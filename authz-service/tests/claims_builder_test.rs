mod common;

use async_trait::async_trait;
use authz_service::models::{AccessClaims, OrgRef, OrganizationGrant, WebserviceScope};
use authz_service::services::{
    AuthzError, ClaimsBuilder, ClaimsContributor, InMemoryAccessDirectory, LicensedOrganizations,
    Principal,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

/// Grants a fixed scope on one webservice and counts its invocations.
struct FixedScope {
    name: &'static str,
    webservice: &'static str,
    scope: Option<WebserviceScope>,
    org_only: bool,
    calls: AtomicUsize,
}

impl FixedScope {
    fn new(name: &'static str, webservice: &'static str, scope: Option<WebserviceScope>) -> Self {
        Self {
            name,
            webservice,
            scope,
            org_only: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn org_stage(mut self) -> Self {
        self.org_only = true;
        self
    }
}

#[async_trait]
impl ClaimsContributor for FixedScope {
    fn name(&self) -> &'static str {
        self.name
    }

    fn skipped_for_super_user(&self) -> bool {
        self.org_only
    }

    async fn contribute(
        &self,
        mut claims: AccessClaims,
        _principal: &Principal,
    ) -> Result<AccessClaims, AuthzError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scope) = self.scope {
            claims.grant_webservice(self.webservice, scope);
        }
        Ok(claims)
    }
}

fn webservice_set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Merge rules
// ============================================================================

#[tokio::test]
async fn test_later_full_upgrades_earlier_owner() {
    let builder = ClaimsBuilder::new(
        common::registry(),
        vec![
            Arc::new(FixedScope::new("a", "X", Some(WebserviceScope::Owner))),
            Arc::new(FixedScope::new("b", "X", Some(WebserviceScope::Full))),
        ],
    );

    let claims = builder.build(&Principal::user("u1")).await.unwrap();
    assert_eq!(claims.webservice_scope("X"), Some(WebserviceScope::Full));
}

#[tokio::test]
async fn test_later_stage_never_downgrades() {
    let builder = ClaimsBuilder::new(
        common::registry(),
        vec![
            Arc::new(FixedScope::new("a", "X", Some(WebserviceScope::Full))),
            Arc::new(FixedScope::new("b", "X", Some(WebserviceScope::Owner))),
            Arc::new(FixedScope::new("c", "X", None)),
        ],
    );

    let claims = builder.build(&Principal::user("u1")).await.unwrap();
    assert_eq!(claims.webservice_scope("X"), Some(WebserviceScope::Full));

    let builder = ClaimsBuilder::new(
        common::registry(),
        vec![
            Arc::new(FixedScope::new("a", "X", Some(WebserviceScope::Owner))),
            Arc::new(FixedScope::new("b", "X", None)),
        ],
    );
    let claims = builder.build(&Principal::user("u1")).await.unwrap();
    assert_eq!(claims.webservice_scope("X"), Some(WebserviceScope::Owner));
}

#[tokio::test]
async fn test_owner_list_wins_over_role_list() {
    let org = OrgRef::new("client", "org1");
    let directory = Arc::new(
        InMemoryAccessDirectory::new()
            .with_owned_organization("u1", org.clone())
            .with_subscription(org)
            .with_organization_role("u1", "org1", OrganizationGrant::new("client", ["X"])),
    );
    let builder = ClaimsBuilder::standard(common::registry(), directory);

    let claims = builder.build(&Principal::user("u1")).await.unwrap();

    // Every organization-role webservice, not the role's single entry.
    assert_eq!(
        claims.organizations["org1"].webservices,
        webservice_set(&["X", "list_invoices", "manage_users"])
    );
}

#[tokio::test]
async fn test_role_only_member_gets_role_list() {
    let directory = Arc::new(
        InMemoryAccessDirectory::new()
            .with_organization_role("u2", "org1", OrganizationGrant::new("client", ["manage_users"])),
    );
    let builder = ClaimsBuilder::standard(common::registry(), directory);

    let claims = builder.build(&Principal::user("u2")).await.unwrap();
    assert_eq!(
        claims.organizations["org1"],
        OrganizationGrant::new("client", ["manage_users"])
    );
}

// ============================================================================
// Super user
// ============================================================================

#[tokio::test]
async fn test_super_user_skips_role_and_organization_stages() {
    let org_stage = Arc::new(
        FixedScope::new("org", "manage_users", Some(WebserviceScope::Full)).org_stage(),
    );
    let builder = ClaimsBuilder::new(
        common::registry(),
        vec![
            Arc::new(authz_service::services::BaseIdentity::new(common::registry())),
            org_stage.clone(),
        ],
    );

    let claims = builder.build(&Principal::super_user("root")).await.unwrap();

    assert!(claims.is_super_user);
    assert_eq!(org_stage.calls.load(Ordering::SeqCst), 0);
    assert_eq!(claims.webservice_scope("manage_users"), None);
}

#[tokio::test]
async fn test_super_user_output_has_no_directory_grants() {
    let directory = Arc::new(
        InMemoryAccessDirectory::new()
            .with_role_webservices("root", ["list_invoices"])
            .with_owned_organization("root", OrgRef::new("client", "org1")),
    );
    let builder = ClaimsBuilder::standard(common::registry(), directory);

    let claims = builder.build(&Principal::super_user("root")).await.unwrap();
    assert!(claims.is_super_user);
    assert!(claims.organizations.is_empty());
    assert_eq!(claims.webservice_scope("list_invoices"), None);
    assert_eq!(claims.webservice_scope("me"), Some(WebserviceScope::Full));
}

// ============================================================================
// Licensing
// ============================================================================

#[tokio::test]
async fn test_license_partition_idempotent_and_revocable() {
    let org = OrgRef::new("client", "org1");
    let directory = Arc::new(
        InMemoryAccessDirectory::new()
            .with_owned_organization("u1", org.clone())
            .with_subscription(org.clone()),
    );
    let stage = LicensedOrganizations::new(directory.clone(), common::registry());
    let principal = Principal::user("u1");

    let claims = AccessClaims::new("u1").with_organization(
        "org1",
        OrganizationGrant::new("client", ["X", "list_invoices", "manage_users"]),
    );

    let once = stage.contribute(claims, &principal).await.unwrap();
    let twice = stage.contribute(once.clone(), &principal).await.unwrap();
    assert_eq!(once, twice);
    assert!(once.organizations["org1"].webservices.contains("list_invoices"));

    directory.set_subscription(org, false).unwrap();
    let revoked = stage.contribute(twice, &principal).await.unwrap();
    assert_eq!(
        revoked.organizations["org1"].webservices,
        webservice_set(&["X", "manage_users"])
    );
}

#[tokio::test]
async fn test_member_needs_license_seat() {
    let org = OrgRef::new("client", "org1");
    let grant = OrganizationGrant::new("client", ["list_invoices", "manage_users"]);

    let without_seat = Arc::new(
        InMemoryAccessDirectory::new().with_organization_role("u2", "org1", grant.clone()),
    );
    let claims = ClaimsBuilder::standard(common::registry(), without_seat)
        .build(&Principal::user("u2"))
        .await
        .unwrap();
    assert_eq!(
        claims.organizations["org1"].webservices,
        webservice_set(&["manage_users"])
    );

    let with_seat = Arc::new(
        InMemoryAccessDirectory::new()
            .with_organization_role("u2", "org1", grant)
            .with_license("u2", org),
    );
    let claims = ClaimsBuilder::standard(common::registry(), with_seat)
        .build(&Principal::user("u2"))
        .await
        .unwrap();
    assert_eq!(
        claims.organizations["org1"].webservices,
        webservice_set(&["list_invoices", "manage_users"])
    );
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_lookup_failure_issues_nothing() {
    let directory = Arc::new(InMemoryAccessDirectory::new().with_outage());
    let builder = ClaimsBuilder::standard(common::registry(), directory);

    let result = builder.build(&Principal::user("u1")).await;
    assert!(matches!(result, Err(AuthzError::ClaimsStage { .. })));
}

#[tokio::test]
async fn test_disabled_webservices_never_reach_claims() {
    let directory = Arc::new(InMemoryAccessDirectory::new().with_role_webservices("u1", ["retired", "list_invoices"]));
    let builder = ClaimsBuilder::standard(common::registry(), directory);

    let claims = builder.build(&Principal::user("u1")).await.unwrap();
    assert_eq!(claims.webservice_scope("retired"), None);
    assert_eq!(claims.webservice_scope("list_invoices"), Some(WebserviceScope::Full));
}
