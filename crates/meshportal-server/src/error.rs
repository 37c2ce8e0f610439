//! Error types for the portal service.
//!
//! [`PortalError`] unifies all failure modes and implements
//! [`axum::response::IntoResponse`] so handlers can return
//! `Result<…, PortalError>` directly. The wire shape is always
//! `{message, error, statusCode}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meshportal_models::ModelError;
use serde_json::json;

/// Errors that can occur while serving a portal request.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// One or more required auth fields stayed unresolved after all
    /// fallbacks. The diagnostic lists which fields resolved and whether a
    /// client secret was found, never the secret itself.
    #[error("Default auth configuration incomplete.")]
    IncompleteAuthConfig {
        /// Field-by-field resolution summary.
        diagnostic: String,
    },

    /// The organization could not be derived from the request hostname.
    #[error("Tenant could not be resolved: {0}")]
    TenantUnresolvable(String),

    /// A service-provider request arrived without a bearer token.
    #[error("Token is required")]
    MissingToken,

    /// A subdomain service-provider request carried no organization.
    #[error("Context with organization is required")]
    MissingOrganization,

    /// The backend rate-limited us twice in a row.
    #[error("Upstream rate limited")]
    RateLimited,

    /// A content-configuration item failed validation or decoding.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// An upstream HTTP call failed at the transport level.
    #[error("failed to reach upstream: {0}")]
    Http(#[from] reqwest::Error),

    /// An upstream call returned a non-success status.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Refresh-token revocation failed and no front-channel fallback was
    /// possible. Carries the upstream error body when present.
    #[error("Logout failed")]
    LogoutFailed(String),

    /// Invalid or missing service configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialisation error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::IncompleteAuthConfig { diagnostic } => {
                (StatusCode::NOT_FOUND, diagnostic.clone())
            }
            Self::TenantUnresolvable(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::MissingToken | Self::MissingOrganization => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Self::Model(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            Self::Http(_) | Self::Upstream(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            Self::LogoutFailed(body) => (StatusCode::INTERNAL_SERVER_ERROR, body.clone()),
            Self::Config(_) | Self::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        tracing::error!(%status, error = %detail, "request failed");
        let body = json!({
            "message": self.to_string(),
            "error": detail,
            "statusCode": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
