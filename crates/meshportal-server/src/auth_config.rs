//! Per-request auth configuration resolution.
//!
//! Resolution walks a fixed fallback chain:
//!
//! 1. Static per-IDP environment configuration, keyed by the IDP name
//!    derived from the tenant (the organization on subdomains, `default`
//!    on the base domain).
//! 2. OIDC discovery: the tenant's templated discovery endpoint when one
//!    is configured, then the `DEFAULT` issuer.
//! 3. Static default endpoints and credentials, with the tenant client
//!    secret fetched live from the Kubernetes Secret
//!    `portal-client-secret-<organization>` when a KCP cluster is
//!    configured.
//!
//! Whatever is still missing afterwards fails the request with a 404 and a
//! diagnostic naming the unresolved fields (never the secret value).

use meshportal_models::AuthConfig;

use crate::config::PortalConfig;
use crate::discovery::{DEFAULT_ISSUER_KEY, DiscoveryService, OidcDocument};
use crate::domain;
use crate::error::PortalError;
use crate::kcp::KcpService;
use crate::request::RequestInfo;

/// IDP name used for base-domain requests.
const DEFAULT_IDP_NAME: &str = "default";

/// Resolver for the per-request [`AuthConfig`].
#[derive(Debug, Clone)]
pub struct AuthConfigProvider {
    discovery: DiscoveryService,
    kcp: Option<KcpService>,
}

impl AuthConfigProvider {
    /// Create the provider. `kcp` enables live tenant-secret lookups.
    pub fn new(discovery: DiscoveryService, kcp: Option<KcpService>) -> Self {
        Self { discovery, kcp }
    }

    /// Resolve the auth configuration for one request.
    ///
    /// Idempotent for a fixed request and configuration snapshot; nothing
    /// is cached across calls.
    pub async fn get_auth_config(
        &self,
        config: &PortalConfig,
        request: &RequestInfo,
    ) -> Result<AuthConfig, PortalError> {
        let tenant = domain::resolve(&request.hostname, config)?;
        let idp_name = match (&tenant.organization, tenant.is_sub_domain) {
            (Some(org), true) => org.to_string(),
            _ => DEFAULT_IDP_NAME.to_string(),
        };

        if let Some(idp) = config.idp(&idp_name) {
            return Ok(AuthConfig {
                idp_name,
                base_domain: tenant.base_domain,
                client_id: idp.client_id.clone(),
                client_secret: idp.client_secret.clone(),
                oauth_server_url: idp.base_url.clone(),
                oauth_token_url: idp.token_url.clone(),
                oidc_issuer_url: None,
                end_session_url: idp.end_session_url.clone(),
            });
        }

        tracing::info!(
            idp = %idp_name,
            "no static auth config for IDP, resolving from default configuration"
        );

        // Tenant-templated discovery first, then the DEFAULT issuer.
        let mut oidc: Option<OidcDocument> = None;
        if let Some(url) = domain::discovery_endpoint(&tenant, config) {
            oidc = self.discovery.get_oidc(&url).await;
        }
        if oidc.is_none() {
            oidc = self.discovery.get_oidc(DEFAULT_ISSUER_KEY).await;
        }
        let oidc = oidc.unwrap_or_default();

        let oauth_server_url = oidc
            .authorization_endpoint
            .clone()
            .or_else(|| config.auth_server_url_default.clone());
        let oauth_token_url = oidc
            .token_endpoint
            .clone()
            .or_else(|| config.token_url_default.clone());
        let client_id = config.default_client_id.clone();

        let client_secret = match (&self.kcp, &tenant.organization) {
            (Some(kcp), Some(org)) => kcp.read_client_secret(org).await.ok(),
            _ => config.default_client_secret.clone(),
        };

        match (
            non_empty(oauth_server_url),
            non_empty(oauth_token_url),
            non_empty(client_id),
            non_empty(client_secret),
        ) {
            (
                Some(oauth_server_url),
                Some(oauth_token_url),
                Some(client_id),
                Some(client_secret),
            ) => Ok(AuthConfig {
                idp_name,
                base_domain: tenant.base_domain,
                client_id,
                client_secret,
                oauth_server_url,
                oauth_token_url,
                oidc_issuer_url: oidc.issuer,
                end_session_url: oidc.end_session_endpoint,
            }),
            (server, token, id, secret) => Err(PortalError::IncompleteAuthConfig {
                diagnostic: format!(
                    "oauthServerUrl: '{}' oauthTokenUrl: '{}' clientId: '{}', has client secret: {}",
                    server.unwrap_or_default(),
                    token.unwrap_or_default(),
                    id.unwrap_or_default(),
                    secret.is_some(),
                ),
            }),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdpConfig;

    fn provider() -> AuthConfigProvider {
        AuthConfigProvider::new(
            DiscoveryService::new(reqwest::Client::new(), &PortalConfig::default()),
            None,
        )
    }

    fn config() -> PortalConfig {
        PortalConfig {
            base_domain: Some("example.com".into()),
            default_client_id: Some("portal-default".into()),
            default_client_secret: Some("default-secret".into()),
            auth_server_url_default: Some("https://idp.invalid/auth".into()),
            token_url_default: Some("https://idp.invalid/token".into()),
            ..PortalConfig::default()
        }
    }

    fn with_idp(mut config: PortalConfig, name: &str) -> PortalConfig {
        config.idps.insert(
            name.into(),
            IdpConfig {
                base_url: format!("https://{name}.idp.example.com/auth"),
                token_url: format!("https://{name}.idp.example.com/token"),
                client_id: format!("{name}-client"),
                client_secret: format!("{name}-secret"),
                end_session_url: Some(format!("https://{name}.idp.example.com/logout")),
            },
        );
        config
    }

    #[tokio::test]
    async fn static_idp_config_wins() {
        let config = with_idp(config(), "team1");
        let request = RequestInfo::for_host("team1.example.com");

        let auth = provider().get_auth_config(&config, &request).await.unwrap();
        assert_eq!(auth.idp_name, "team1");
        assert_eq!(auth.client_id, "team1-client");
        assert_eq!(auth.oauth_server_url, "https://team1.idp.example.com/auth");
        assert_eq!(
            auth.end_session_url.as_deref(),
            Some("https://team1.idp.example.com/logout")
        );
    }

    #[tokio::test]
    async fn base_domain_uses_default_idp_name() {
        let config = with_idp(config(), "default");
        let request = RequestInfo::for_host("example.com");

        let auth = provider().get_auth_config(&config, &request).await.unwrap();
        assert_eq!(auth.idp_name, "default");
        assert_eq!(auth.client_id, "default-client");
    }

    #[tokio::test]
    async fn fallback_uses_static_defaults_when_discovery_unavailable() {
        // No IDP block, no reachable discovery endpoint: the chain must
        // land on the configured defaults.
        let config = config();
        let request = RequestInfo::for_host("team1.example.com");

        let auth = provider().get_auth_config(&config, &request).await.unwrap();
        assert_eq!(auth.idp_name, "team1");
        assert_eq!(auth.oauth_server_url, "https://idp.invalid/auth");
        assert_eq!(auth.oauth_token_url, "https://idp.invalid/token");
        assert_eq!(auth.client_id, "portal-default");
        assert_eq!(auth.client_secret, "default-secret");
        assert!(auth.oidc_issuer_url.is_none());
    }

    #[tokio::test]
    async fn repeated_resolution_is_idempotent() {
        let config = config();
        let request = RequestInfo::for_host("team1.example.com");
        let provider = provider();

        let first = provider.get_auth_config(&config, &request).await.unwrap();
        let second = provider.get_auth_config(&config, &request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn incomplete_configuration_is_a_404_with_diagnostic() {
        let mut config = config();
        config.default_client_secret = None;
        config.token_url_default = None;
        let request = RequestInfo::for_host("team1.example.com");

        let err = provider()
            .get_auth_config(&config, &request)
            .await
            .unwrap_err();
        let PortalError::IncompleteAuthConfig { diagnostic } = err else {
            panic!("expected IncompleteAuthConfig, got {err:?}");
        };
        assert!(diagnostic.contains("oauthTokenUrl: ''"));
        assert!(diagnostic.contains("has client secret: false"));
        assert!(!diagnostic.contains("default-secret"));
    }

    #[tokio::test]
    async fn unresolvable_tenant_propagates() {
        let config = config();
        let request = RequestInfo::for_host("Bad_Org.example.com");
        let err = provider()
            .get_auth_config(&config, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::TenantUnresolvable(_)));
    }
}
