use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AuthzConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub jwt: JwtConfig,
    pub service_token: ServiceTokenConfig,
    pub registry_path: String,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JwtAlgorithm {
    Hs256,
    Rs256,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub algorithm: JwtAlgorithm,
    pub secret: Option<String>,
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct ServiceTokenConfig {
    pub secret: String,
    pub audience: String,
    /// Stamped on issued tokens and always accepted.
    pub issuer: String,
    /// Further issuers accepted on validation.
    pub allowed_issuers: Vec<String>,
    pub expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `None` disables live subscription checks.
    pub live_check_timeout: Option<Duration>,
    pub max_hierarchy_depth: usize,
    pub require_xsrf: bool,
}

pub const DEFAULT_SERVICE_TOKEN_AUDIENCE: &str = "internal-services";
pub const DEFAULT_SERVICE_TOKEN_ISSUER: &str = "authz-service";

impl AuthzConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let algorithm: JwtAlgorithm = get_env("JWT_ALGORITHM", Some("HS256"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let live_check_timeout_ms: u64 = parse_env("LIVE_CHECK_TIMEOUT_MS", "0", is_prod)?;

        let config = AuthzConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("authz-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            jwt: JwtConfig {
                algorithm,
                secret: match algorithm {
                    JwtAlgorithm::Hs256 => Some(get_env("JWT_SECRET", None, is_prod)?),
                    JwtAlgorithm::Rs256 => None,
                },
                private_key_path: match algorithm {
                    JwtAlgorithm::Rs256 => Some(get_env("JWT_PRIVATE_KEY_PATH", None, is_prod)?),
                    JwtAlgorithm::Hs256 => None,
                },
                public_key_path: match algorithm {
                    JwtAlgorithm::Rs256 => Some(get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?),
                    JwtAlgorithm::Hs256 => None,
                },
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
            },
            service_token: ServiceTokenConfig {
                secret: get_env("SERVICE_TOKEN_SECRET", None, is_prod)?,
                audience: get_env(
                    "SERVICE_TOKEN_AUDIENCE",
                    Some(DEFAULT_SERVICE_TOKEN_AUDIENCE),
                    is_prod,
                )?,
                issuer: get_env(
                    "SERVICE_TOKEN_ISSUER",
                    Some(DEFAULT_SERVICE_TOKEN_ISSUER),
                    is_prod,
                )?,
                allowed_issuers: get_env("SERVICE_TOKEN_ALLOWED_ISSUERS", Some(""), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                expiry_minutes: parse_env("SERVICE_TOKEN_EXPIRY_MINUTES", "1", is_prod)?,
            },
            registry_path: get_env(
                "WEBSERVICE_REGISTRY_PATH",
                Some("configuration/webservices.json"),
                is_prod,
            )?,
            engine: EngineConfig {
                live_check_timeout: (live_check_timeout_ms > 0)
                    .then(|| Duration::from_millis(live_check_timeout_ms)),
                max_hierarchy_depth: parse_env("MAX_HIERARCHY_DEPTH", "32", is_prod)?,
                require_xsrf: parse_env("REQUIRE_XSRF", "true", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.service_token.expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SERVICE_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        match self.jwt.algorithm {
            JwtAlgorithm::Hs256 if self.jwt.secret.as_deref().unwrap_or("").is_empty() => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must not be empty with HS256"
                )));
            }
            JwtAlgorithm::Rs256
                if self.jwt.private_key_path.is_none() || self.jwt.public_key_path.is_none() =>
            {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_PRIVATE_KEY_PATH and JWT_PUBLIC_KEY_PATH are required with RS256"
                )));
            }
            _ => {}
        }

        if self.service_token.secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SERVICE_TOKEN_SECRET must not be empty"
            )));
        }

        if self.service_token.issuer.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SERVICE_TOKEN_ISSUER must not be empty"
            )));
        }

        if self.engine.max_hierarchy_depth == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAX_HIERARCHY_DEPTH must be greater than 0"
            )));
        }

        if self.environment == Environment::Prod && !self.engine.require_xsrf {
            tracing::warn!("XSRF verification is disabled in production");
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for JwtAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(JwtAlgorithm::Hs256),
            "RS256" => Ok(JwtAlgorithm::Rs256),
            _ => Err(format!("Unsupported JWT algorithm: {}", s)),
        }
    }
}
