//! Portal service configuration.
//!
//! All environment access happens here, once, at startup. The resulting
//! [`PortalConfig`] is immutable and passed by reference into every
//! component, so resolvers never touch `std::env` themselves.

use std::collections::{BTreeMap, HashMap};

/// Prefix for environment variables projected into the portal context.
pub const PORTAL_CONTEXT_PREFIX: &str = "OPENMFP_PORTAL_CONTEXT_";

/// Static OIDC parameters for one named identity provider, read from
/// `IDP_<NAME>_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpConfig {
    /// Authorization endpoint.
    pub base_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// End-session endpoint, when configured.
    pub end_session_url: Option<String>,
}

/// Global configuration shared across all handlers.
///
/// Constructed once at startup and passed as Axum shared state.
#[derive(Debug, Clone, Default)]
pub struct PortalConfig {
    /// Port to listen on (default `3001`).
    pub listen_port: u16,
    /// The base domain tenant subdomains are provisioned under.
    pub base_domain: Option<String>,
    /// Organization / client id used for base-domain requests.
    pub default_client_id: Option<String>,
    /// Fallback client secret when no tenant secret can be fetched.
    pub default_client_secret: Option<String>,
    /// Fallback authorization endpoint.
    pub auth_server_url_default: Option<String>,
    /// Fallback token endpoint.
    pub token_url_default: Option<String>,
    /// OIDC discovery URL template containing `${org-name}`.
    pub discovery_endpoint: Option<String>,
    /// Path to the kubeconfig for the KCP API server.
    pub kubeconfig_kcp: Option<String>,
    /// Explicit frontend port override for public URLs.
    pub frontend_port: Option<String>,
    /// When set, every request resolves to this fixed organization
    /// (local development mode).
    pub local_organization: Option<String>,
    /// Per-IDP static auth configs, keyed by lower-cased IDP name.
    pub idps: HashMap<String, IdpConfig>,
    /// `OPENMFP_PORTAL_CONTEXT_*` values, keyed by camelCased name.
    pub portal_context: BTreeMap<String, String>,
}

impl PortalConfig {
    /// Build the configuration from the process environment.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `PORTAL_PORT` | HTTP listen port (default `3001`) |
    /// | `BASE_DOMAINS_DEFAULT` | Base domain for tenant subdomains |
    /// | `OIDC_CLIENT_ID_DEFAULT` | Client id / organization for the base domain |
    /// | `OIDC_CLIENT_SECRET_DEFAULT` | Fallback client secret |
    /// | `AUTH_SERVER_URL_DEFAULT` | Fallback authorization endpoint |
    /// | `TOKEN_URL_DEFAULT` | Fallback token endpoint |
    /// | `DISCOVERY_ENDPOINT` | Discovery URL template with `${org-name}` |
    /// | `KUBECONFIG_KCP` | Path to the KCP kubeconfig |
    /// | `FRONTEND_PORT` | Port override for public-facing URLs |
    /// | `LOCAL_DEVELOPMENT_ORGANIZATION` | Fixed organization for local dev |
    /// | `IDP_NAMES` | Comma-separated list of configured IDPs |
    /// | `IDP_<NAME>_BASE_URL` … | Per-IDP endpoints and credentials |
    /// | `OPENMFP_PORTAL_CONTEXT_*` | Projected into the portal context |
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build the configuration from an explicit variable set.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let env: HashMap<String, String> = vars.into_iter().collect();
        let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

        let listen_port = get("PORTAL_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3001);

        let mut idps = HashMap::new();
        for name in get("IDP_NAMES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            let upper = name.to_uppercase().replace('-', "_");
            let var = |suffix: &str| get(&format!("IDP_{upper}_{suffix}"));
            let (Some(base_url), Some(token_url), Some(client_id), Some(client_secret)) = (
                var("BASE_URL"),
                var("TOKEN_URL"),
                var("CLIENT_ID"),
                var("CLIENT_SECRET"),
            ) else {
                tracing::warn!(idp = name, "incomplete IDP configuration, skipping");
                continue;
            };
            idps.insert(
                name.to_lowercase(),
                IdpConfig {
                    base_url,
                    token_url,
                    client_id,
                    client_secret,
                    end_session_url: var("END_SESSION_URL"),
                },
            );
        }

        let mut portal_context = BTreeMap::new();
        for (key, value) in &env {
            if let Some(stripped) = key.strip_prefix(PORTAL_CONTEXT_PREFIX) {
                let stripped = stripped.trim();
                if !stripped.is_empty() {
                    portal_context.insert(to_camel_case(stripped), value.clone());
                }
            }
        }

        Self {
            listen_port,
            base_domain: get("BASE_DOMAINS_DEFAULT"),
            default_client_id: get("OIDC_CLIENT_ID_DEFAULT"),
            default_client_secret: get("OIDC_CLIENT_SECRET_DEFAULT"),
            auth_server_url_default: get("AUTH_SERVER_URL_DEFAULT"),
            token_url_default: get("TOKEN_URL_DEFAULT"),
            discovery_endpoint: get("DISCOVERY_ENDPOINT"),
            kubeconfig_kcp: get("KUBECONFIG_KCP"),
            frontend_port: get("FRONTEND_PORT"),
            local_organization: get("LOCAL_DEVELOPMENT_ORGANIZATION"),
            idps,
            portal_context,
        }
    }

    /// Look up the static auth config for the given IDP name.
    pub fn idp(&self, name: &str) -> Option<&IdpConfig> {
        self.idps.get(&name.to_lowercase())
    }
}

/// Convert a `SNAKE_CASE` variable suffix to `camelCase`.
fn to_camel_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, segment) in text.split('_').enumerate() {
        let lower = segment.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_empty() {
        let cfg = PortalConfig::from_vars(vars(&[]));
        assert_eq!(cfg.listen_port, 3001);
        assert!(cfg.base_domain.is_none());
        assert!(cfg.idps.is_empty());
        assert!(cfg.portal_context.is_empty());
    }

    #[test]
    fn reads_core_variables() {
        let cfg = PortalConfig::from_vars(vars(&[
            ("PORTAL_PORT", "8080"),
            ("BASE_DOMAINS_DEFAULT", "example.com"),
            ("OIDC_CLIENT_ID_DEFAULT", "portal"),
            ("DISCOVERY_ENDPOINT", "https://idp.example.com/${org-name}"),
        ]));
        assert_eq!(cfg.listen_port, 8080);
        assert_eq!(cfg.base_domain.as_deref(), Some("example.com"));
        assert_eq!(cfg.default_client_id.as_deref(), Some("portal"));
        assert_eq!(
            cfg.discovery_endpoint.as_deref(),
            Some("https://idp.example.com/${org-name}")
        );
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = PortalConfig::from_vars(vars(&[("BASE_DOMAINS_DEFAULT", "")]));
        assert!(cfg.base_domain.is_none());
    }

    #[test]
    fn parses_idp_blocks() {
        let cfg = PortalConfig::from_vars(vars(&[
            ("IDP_NAMES", "keycloak, team1"),
            ("IDP_KEYCLOAK_BASE_URL", "https://kc.example.com/auth"),
            ("IDP_KEYCLOAK_TOKEN_URL", "https://kc.example.com/token"),
            ("IDP_KEYCLOAK_CLIENT_ID", "kc-client"),
            ("IDP_KEYCLOAK_CLIENT_SECRET", "kc-secret"),
            ("IDP_KEYCLOAK_END_SESSION_URL", "https://kc.example.com/logout"),
            // team1 is listed but not fully configured
            ("IDP_TEAM1_BASE_URL", "https://t1.example.com/auth"),
        ]));
        let kc = cfg.idp("keycloak").unwrap();
        assert_eq!(kc.client_id, "kc-client");
        assert_eq!(
            kc.end_session_url.as_deref(),
            Some("https://kc.example.com/logout")
        );
        assert!(cfg.idp("team1").is_none());
    }

    #[test]
    fn idp_lookup_is_case_insensitive() {
        let cfg = PortalConfig::from_vars(vars(&[
            ("IDP_NAMES", "my-idp"),
            ("IDP_MY_IDP_BASE_URL", "https://a"),
            ("IDP_MY_IDP_TOKEN_URL", "https://b"),
            ("IDP_MY_IDP_CLIENT_ID", "c"),
            ("IDP_MY_IDP_CLIENT_SECRET", "d"),
        ]));
        assert!(cfg.idp("MY-IDP").is_some());
        assert!(cfg.idp("my-idp").is_some());
    }

    #[test]
    fn projects_portal_context_variables() {
        let cfg = PortalConfig::from_vars(vars(&[
            ("OPENMFP_PORTAL_CONTEXT_TEST_KEY", "test-value"),
            ("OPENMFP_PORTAL_CONTEXT_MULTIPLE_SNAKE_CASE_KEYS", "v2"),
            ("OTHER_ENV_VAR", "ignored"),
        ]));
        assert_eq!(cfg.portal_context["testKey"], "test-value");
        assert_eq!(cfg.portal_context["multipleSnakeCaseKeys"], "v2");
        assert_eq!(cfg.portal_context.len(), 2);
    }

    #[test]
    fn drops_empty_context_key() {
        let cfg = PortalConfig::from_vars(vars(&[("OPENMFP_PORTAL_CONTEXT_", "x")]));
        assert!(cfg.portal_context.is_empty());
    }

    #[test]
    fn camel_case_conversion() {
        assert_eq!(to_camel_case("CRD_GATEWAY_API_URL"), "crdGatewayApiUrl");
        assert_eq!(to_camel_case("SINGLE"), "single");
        assert_eq!(to_camel_case("IAM_SERVICE_API_URL"), "iamServiceApiUrl");
    }
}
