use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::error::AuthzError;
use crate::config::ServiceTokenConfig;
use crate::models::{ServiceIdentity, ServiceTokenClaims, SERVICE_TOKEN_TYPE};

/// Short-lived HS256 tokens for service-to-service calls.
#[derive(Clone)]
pub struct ServiceTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    audience: String,
    issuer: String,
    accepted_issuers: Vec<String>,
    expiry_minutes: i64,
}

impl ServiceTokenService {
    pub fn new(config: &ServiceTokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
            accepted_issuers: std::iter::once(&config.issuer)
                .chain(&config.allowed_issuers)
                .cloned()
                .collect(),
            expiry_minutes: config.expiry_minutes,
        }
    }

    /// Token asserting that `service_name`/`instance_id` is calling.
    pub fn issue(&self, service_name: &str, instance_id: &str) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = ServiceTokenClaims {
            token_type: SERVICE_TOKEN_TYPE.to_string(),
            service_name: service_name.to_string(),
            instance_id: instance_id.to_string(),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.expiry_minutes)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode service token: {}", e))
    }

    /// Decode a service token. A token of another type, for another audience
    /// or from an issuer not accepted here is invalid, not absent.
    pub fn validate(&self, token: &str) -> Result<ServiceIdentity, AuthzError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.set_issuer(&self.accepted_issuers);

        let claims = decode::<ServiceTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthzError::unauthenticated(format!("service token: {}", e)))?
            .claims;

        if claims.token_type != SERVICE_TOKEN_TYPE {
            return Err(AuthzError::unauthenticated(format!(
                "service token: unexpected type '{}'",
                claims.token_type
            )));
        }

        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(audience: &str, issuers: &[&str]) -> ServiceTokenConfig {
        ServiceTokenConfig {
            secret: "service-secret".to_string(),
            audience: audience.to_string(),
            issuer: "authz".to_string(),
            allowed_issuers: issuers.iter().map(|s| s.to_string()).collect(),
            expiry_minutes: 1,
        }
    }

    #[test]
    fn test_round_trip() -> Result<(), anyhow::Error> {
        let service = ServiceTokenService::new(&config("internal", &[]));
        let token = service.issue("billing", "billing-1")?;

        let identity = service.validate(&token)?;
        assert_eq!(identity.service_name, "billing");
        assert_eq!(identity.instance_id, "billing-1");
        Ok(())
    }

    #[test]
    fn test_audience_mismatch_is_rejected() -> Result<(), anyhow::Error> {
        let issuer = ServiceTokenService::new(&config("other", &[]));
        let verifier = ServiceTokenService::new(&config("internal", &[]));
        let token = issuer.issue("billing", "billing-1")?;

        assert!(matches!(
            verifier.validate(&token),
            Err(AuthzError::Unauthenticated { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_issuer_allow_list() -> Result<(), anyhow::Error> {
        let verifier = ServiceTokenService::new(&config("internal", &["ledger"]));
        assert!(verifier.validate(&verifier.issue("billing", "billing-1")?).is_ok());

        let ledger = ServiceTokenService::new(&ServiceTokenConfig {
            issuer: "ledger".to_string(),
            ..config("internal", &[])
        });
        assert!(verifier.validate(&ledger.issue("billing", "billing-1")?).is_ok());
        Ok(())
    }

    #[test]
    fn test_foreign_issuer_is_rejected_by_default() -> Result<(), anyhow::Error> {
        let verifier = ServiceTokenService::new(&config("internal", &[]));
        let rogue = ServiceTokenService::new(&ServiceTokenConfig {
            issuer: "rogue".to_string(),
            ..config("internal", &[])
        });
        let token = rogue.issue("billing", "billing-1")?;

        assert!(matches!(
            verifier.validate(&token),
            Err(AuthzError::Unauthenticated { detail }) if detail.contains("service token")
        ));
        Ok(())
    }

    #[test]
    fn test_non_service_type_is_rejected() -> Result<(), anyhow::Error> {
        let config = config("internal", &[]);
        let service = ServiceTokenService::new(&config);
        let now = Utc::now().timestamp();
        let claims = ServiceTokenClaims {
            token_type: "user".to_string(),
            service_name: "billing".to_string(),
            instance_id: "billing-1".to_string(),
            aud: "internal".to_string(),
            iss: "authz".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )?;

        assert!(matches!(
            service.validate(&token),
            Err(AuthzError::Unauthenticated { detail }) if detail.contains("unexpected type")
        ));
        Ok(())
    }
}
