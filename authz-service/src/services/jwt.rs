use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use std::fs;

use super::error::AuthzError;
use crate::config::{JwtAlgorithm, JwtConfig};
use crate::models::{AccessClaims, AccessTokenClaims};

/// Signs and verifies end-user access tokens.
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

impl JwtService {
    /// Shared secret (HS256) or RSA key files (RS256), per config.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let service = match config.algorithm {
            JwtAlgorithm::Hs256 => {
                let secret = config
                    .secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| anyhow::anyhow!("JWT secret is required for HS256"))?;
                Self::from_secret(secret.as_bytes(), config.access_token_expiry_minutes)
            }
            JwtAlgorithm::Rs256 => {
                let private_key_path = config
                    .private_key_path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("JWT private key path is required for RS256"))?;
                let public_key_path = config
                    .public_key_path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("JWT public key path is required for RS256"))?;

                let private_key_pem = fs::read_to_string(private_key_path).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to read private key from {}: {}",
                        private_key_path,
                        e
                    )
                })?;
                let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;

                let public_key_pem = fs::read_to_string(public_key_path).map_err(|e| {
                    anyhow::anyhow!("Failed to read public key from {}: {}", public_key_path, e)
                })?;
                let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

                Self {
                    algorithm: Algorithm::RS256,
                    encoding_key,
                    decoding_key,
                    access_token_expiry_minutes: config.access_token_expiry_minutes,
                }
            }
        };

        tracing::info!(algorithm = ?service.algorithm, "JWT service initialized");
        Ok(service)
    }

    pub fn from_secret(secret: &[u8], access_token_expiry_minutes: i64) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_minutes,
        }
    }

    /// Sign `claims` with a fresh expiry and anti-forgery token.
    pub fn issue_access_token(
        &self,
        claims: AccessClaims,
    ) -> Result<(String, AccessTokenClaims), anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let token_claims = AccessTokenClaims {
            claims,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            xsrf_token: generate_xsrf_token(),
        };

        let header = Header::new(self.algorithm);
        let token = encode(&header, &token_claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok((token, token_claims))
    }

    /// Validate and decode an access token. The caller-visible error never
    /// says why validation failed.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthzError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthzError::unauthenticated(format!("access token: {}", e)))?;

        Ok(token_data.claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

/// 64 random bytes, hex encoded.
pub fn generate_xsrf_token() -> String {
    let mut bytes = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
