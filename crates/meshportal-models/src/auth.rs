//! Per-request resolved authentication configuration.

use serde::{Deserialize, Serialize};

/// OIDC/OAuth parameters resolved for the current tenant.
///
/// Constructed fresh for every request; never cached across requests
/// (each resolution may re-fetch the tenant client secret).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Name of the identity provider this config was resolved for.
    /// Equals the organization on subdomain requests, `"default"` on the
    /// base domain.
    pub idp_name: String,
    /// Base domain the tenant hierarchy lives under.
    pub base_domain: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret. Never logged and never serialized into
    /// diagnostics; handlers redact it before returning it to callers.
    pub client_secret: String,
    /// Authorization endpoint.
    pub oauth_server_url: String,
    /// Token endpoint.
    pub oauth_token_url: String,
    /// OIDC issuer, when discovery provided one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc_issuer_url: Option<String>,
    /// End-session (logout/revocation) endpoint, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthConfig {
        AuthConfig {
            idp_name: "team1".into(),
            base_domain: "example.com".into(),
            client_id: "team1".into(),
            client_secret: "s3cret".into(),
            oauth_server_url: "https://idp.example.com/auth".into(),
            oauth_token_url: "https://idp.example.com/token".into(),
            oidc_issuer_url: None,
            end_session_url: None,
        }
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["idpName"], "team1");
        assert_eq!(json["oauthServerUrl"], "https://idp.example.com/auth");
        assert!(json.get("oidcIssuerUrl").is_none());
    }
}
