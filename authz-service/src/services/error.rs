use axum::http::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

use super::hierarchy::HierarchyError;

#[derive(Error, Debug)]
pub enum AuthzError {
    /// Token absent where required, expired, malformed or forged. The detail
    /// is for logs only.
    #[error("unauthenticated")]
    Unauthenticated { detail: String },

    #[error("permission denied")]
    PermissionDenied,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("already connected")]
    AlreadyConnected,

    #[error("unknown webservice: {0}")]
    UnknownWebservice(String),

    #[error("invalid configuration for webservice '{webservice}': {message}")]
    Configuration { webservice: String, message: String },

    #[error("organization hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("claims stage '{stage}' failed: {source}")]
    ClaimsStage {
        stage: &'static str,
        #[source]
        source: Box<AuthzError>,
    },

    #[error("lookup failed: {0}")]
    Lookup(#[source] anyhow::Error),

    #[error("authorization indeterminate: {0}")]
    Indeterminate(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthzError {
    pub fn unauthenticated(detail: impl Into<String>) -> Self {
        AuthzError::Unauthenticated {
            detail: detail.into(),
        }
    }

    pub fn configuration(webservice: impl Into<String>, message: impl Into<String>) -> Self {
        AuthzError::Configuration {
            webservice: webservice.into(),
            message: message.into(),
        }
    }

    /// Stable code understood by the transport collaborator.
    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::Unauthenticated { .. } | AuthzError::AuthenticationRequired => {
                "UNAUTHENTICATED"
            }
            AuthzError::PermissionDenied => "PERMISSION_DENIED",
            AuthzError::AlreadyConnected => "ALREADY_CONNECTED",
            AuthzError::UnknownWebservice(_) => "UNKNOWN_WEBSERVICE",
            AuthzError::Configuration { .. } => "CONFIGURATION_ERROR",
            AuthzError::Indeterminate(_) => "INDETERMINATE",
            AuthzError::Hierarchy(_)
            | AuthzError::ClaimsStage { .. }
            | AuthzError::Lookup(_)
            | AuthzError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthzError::Unauthenticated { .. } | AuthzError::AuthenticationRequired => {
                StatusCode::UNAUTHORIZED
            }
            AuthzError::PermissionDenied | AuthzError::AlreadyConnected => StatusCode::FORBIDDEN,
            AuthzError::UnknownWebservice(_) => StatusCode::NOT_FOUND,
            AuthzError::Indeterminate(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated { detail } => {
                tracing::warn!(detail = %detail, "Authentication failed");
                AppError::Unauthorized(anyhow::anyhow!("unauthenticated"))
            }
            AuthzError::AuthenticationRequired => {
                AppError::Unauthorized(anyhow::anyhow!("unauthenticated"))
            }
            AuthzError::PermissionDenied => AppError::Forbidden(anyhow::anyhow!("permission denied")),
            AuthzError::AlreadyConnected => AppError::Forbidden(anyhow::anyhow!("already connected")),
            AuthzError::UnknownWebservice(id) => {
                AppError::NotFound(anyhow::anyhow!("unknown webservice: {}", id))
            }
            config @ AuthzError::Configuration { .. } => {
                AppError::ConfigError(anyhow::anyhow!(config))
            }
            AuthzError::Indeterminate(reason) => {
                tracing::error!(reason = %reason, "Authorization indeterminate");
                AppError::ServiceUnavailable
            }
            AuthzError::Internal(e) => AppError::InternalError(e),
            other => AppError::InternalError(anyhow::anyhow!(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_hides_detail() {
        let err = AuthzError::unauthenticated("ExpiredSignature");
        assert_eq!(err.to_string(), "unauthenticated");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let app: AppError = err.into();
        assert_eq!(app.to_string(), "Unauthorized: unauthenticated");
    }

    #[test]
    fn test_status_classes() {
        assert_eq!(AuthzError::PermissionDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthzError::AuthenticationRequired.code(), "UNAUTHENTICATED");
        assert_eq!(
            AuthzError::Indeterminate("timeout".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let app: AppError = AuthzError::UnknownWebservice("x".into()).into();
        assert_eq!(app.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_configuration_error_names_webservice() {
        let err = AuthzError::configuration("login", "a public webservice cannot be licenced");
        assert!(err.to_string().contains("'login'"));
    }
}
