//! OIDC discovery client.
//!
//! Fetches `/.well-known/openid-configuration` documents. Discovery is a
//! best-effort step in the auth fallback chain: transport failures and
//! non-success statuses resolve to `None`, and the caller continues with
//! the static default endpoints.

use serde::{Deserialize, Serialize};

use crate::config::PortalConfig;

/// Key resolving to the deployment-wide default issuer.
pub const DEFAULT_ISSUER_KEY: &str = "DEFAULT";

/// The subset of an OIDC discovery document the portal consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcDocument {
    /// Authorization endpoint.
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint.
    #[serde(default)]
    pub token_endpoint: Option<String>,
    /// Issuer identifier.
    #[serde(default)]
    pub issuer: Option<String>,
    /// End-session (logout) endpoint.
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

/// Discovery-document fetcher with a long-lived HTTP client.
#[derive(Debug, Clone)]
pub struct DiscoveryService {
    http: reqwest::Client,
    default_url: Option<String>,
}

impl DiscoveryService {
    /// Create the service.
    ///
    /// The [`DEFAULT_ISSUER_KEY`] resolves against the origin of
    /// `AUTH_SERVER_URL_DEFAULT`.
    pub fn new(http: reqwest::Client, config: &PortalConfig) -> Self {
        let default_url = config
            .auth_server_url_default
            .as_deref()
            .and_then(origin)
            .map(|o| format!("{o}/.well-known/openid-configuration"));
        Self { http, default_url }
    }

    /// Fetch the discovery document for a URL, or for the default issuer
    /// when passed [`DEFAULT_ISSUER_KEY`].
    ///
    /// Returns `Ok(None)` when no URL is resolvable, the endpoint is
    /// unreachable, or the document cannot be decoded.
    pub async fn get_oidc(&self, key_or_url: &str) -> Option<OidcDocument> {
        let url = if key_or_url == DEFAULT_ISSUER_KEY {
            self.default_url.clone()?
        } else {
            key_or_url.to_string()
        };

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "OIDC discovery unreachable");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(url = %url, status = %response.status(), "OIDC discovery failed");
            return None;
        }

        match response.json::<OidcDocument>().await {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "malformed OIDC discovery document");
                None
            }
        }
    }
}

/// Extract `scheme://host[:port]` from a URL string.
pub(crate) fn origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}"))
}
