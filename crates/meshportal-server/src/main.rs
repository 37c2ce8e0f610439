//! MeshPortal provider service — multi-tenant portal backend.
//!
//! Derives the tenant from each request's hostname and serves the portal
//! provider surface on top of it:
//!
//! 1. `GET /rest/context` — merged request context (query parameters,
//!    substituted template context, tenant identity, workspace URL).
//! 2. `GET /rest/auth/config` — resolved auth configuration, secret
//!    redacted.
//! 3. `GET /rest/service-providers` — tenant content configurations from
//!    the GraphQL gateway or the KCP API.
//! 4. `POST /rest/login/callback` — best-effort IAM user registration.
//! 5. `POST /rest/logout` — refresh-token revocation with front-channel
//!    fallback.

mod auth_config;
mod config;
mod discovery;
mod domain;
mod error;
mod iam;
mod kcp;
mod logout;
mod portal_context;
mod request;
mod service_providers;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use meshportal_models::{AuthConfig, RequestContext, ServiceProviderResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::auth_config::AuthConfigProvider;
use crate::config::PortalConfig;
use crate::discovery::DiscoveryService;
use crate::error::PortalError;
use crate::iam::IamService;
use crate::kcp::{KcpCluster, KcpService};
use crate::logout::LogoutOutcome;
use crate::request::RequestInfo;
use crate::service_providers::{
    ContentConfigurationServiceProviders, KubernetesServiceProviders, ServiceProviderBackend,
};

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared across all Axum handlers.
struct AppState {
    /// Immutable configuration snapshot taken at startup.
    config: PortalConfig,
    /// Auth configuration resolver.
    auth_provider: AuthConfigProvider,
    /// KCP cluster access, when a kubeconfig is configured.
    kcp: Option<KcpService>,
    /// The service-provider resolver selected at startup.
    backend: ServiceProviderBackend,
    /// IAM registration client.
    iam: IamService,
    /// Shared HTTP client for one-shot calls (logout revocation).
    http: reqwest::Client,
}

impl AppState {
    fn new(config: PortalConfig, kcp: Option<KcpService>) -> Self {
        let http = reqwest::Client::new();
        let discovery = DiscoveryService::new(http.clone(), &config);
        let auth_provider = AuthConfigProvider::new(discovery, kcp.clone());

        // The GraphQL gateway is preferred whenever its URL template is
        // configured; otherwise fall back to the raw KCP API.
        let backend = match (&kcp, config.portal_context.contains_key("crdGatewayApiUrl")) {
            (Some(kcp), false) => {
                ServiceProviderBackend::Kubernetes(KubernetesServiceProviders::new(kcp.clone()))
            }
            _ => ServiceProviderBackend::ContentConfiguration(
                ContentConfigurationServiceProviders::new(http.clone()),
            ),
        };

        Self {
            config,
            auth_provider,
            kcp,
            backend,
            iam: IamService::new(http.clone()),
            http,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response DTOs
// ---------------------------------------------------------------------------

/// Response of `GET /rest/auth/config`: the resolved [`AuthConfig`] with
/// the client secret reduced to a presence flag.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthConfigView {
    idp_name: String,
    base_domain: String,
    client_id: String,
    has_client_secret: bool,
    oauth_server_url: String,
    oauth_token_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    oidc_issuer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_session_url: Option<String>,
}

impl From<AuthConfig> for AuthConfigView {
    fn from(auth: AuthConfig) -> Self {
        Self {
            idp_name: auth.idp_name,
            base_domain: auth.base_domain,
            client_id: auth.client_id,
            has_client_secret: !auth.client_secret.is_empty(),
            oauth_server_url: auth.oauth_server_url,
            oauth_token_url: auth.oauth_token_url,
            oidc_issuer_url: auth.oidc_issuer_url,
            end_session_url: auth.end_session_url,
        }
    }
}

/// Body of `POST /rest/login/callback`.
#[derive(Deserialize)]
struct LoginCallbackRequest {
    /// Raw OIDC id token of the freshly authenticated user.
    id_token: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /rest/context` — the merged request context.
async fn get_context(
    State(state): State<Arc<AppState>>,
    request: RequestInfo,
) -> Result<Json<RequestContext>, PortalError> {
    let context =
        portal_context::build_request_context(&state.config, state.kcp.as_ref(), &request)?;
    Ok(Json(context))
}

/// `GET /rest/auth/config` — the resolved auth configuration, redacted.
async fn get_auth_config(
    State(state): State<Arc<AppState>>,
    request: RequestInfo,
) -> Result<Json<AuthConfigView>, PortalError> {
    let auth = state
        .auth_provider
        .get_auth_config(&state.config, &request)
        .await?;
    Ok(Json(auth.into()))
}

/// `GET /rest/service-providers` — tenant content configurations.
///
/// The entity is selected via the `entity` query parameter (default
/// `main`); the bearer token is forwarded to the backend.
async fn get_service_providers(
    State(state): State<Arc<AppState>>,
    request: RequestInfo,
) -> Result<Json<ServiceProviderResponse>, PortalError> {
    let token = request.bearer_token.clone().unwrap_or_default();
    let entities: Vec<String> = request.query.get("entity").cloned().into_iter().collect();
    let context =
        portal_context::build_request_context(&state.config, state.kcp.as_ref(), &request)?;

    let response = state
        .backend
        .get_service_providers(&token, &entities, &context)
        .await?;
    Ok(Json(response))
}

/// `POST /rest/login/callback` — register the user with IAM.
///
/// Always succeeds from the caller's perspective; IAM failures are logged.
async fn login_callback(
    State(state): State<Arc<AppState>>,
    request: RequestInfo,
    Json(body): Json<LoginCallbackRequest>,
) -> Result<StatusCode, PortalError> {
    let context =
        portal_context::build_request_context(&state.config, state.kcp.as_ref(), &request)?;
    state.iam.add_user(&body.id_token, &context).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /rest/logout` — revoke the refresh token, or hand back a
/// front-channel logout URL when revocation is not possible.
async fn post_logout(
    State(state): State<Arc<AppState>>,
    request: RequestInfo,
) -> Result<Response, PortalError> {
    let auth = state
        .auth_provider
        .get_auth_config(&state.config, &request)
        .await?;

    match logout::handle_logout(&state.http, &auth, &request).await? {
        LogoutOutcome::Revoked => Ok(StatusCode::NO_CONTENT.into_response()),
        LogoutOutcome::FrontChannel(url) => {
            Ok(Json(json!({ "logoutUrl": url })).into_response())
        }
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rest/context", get(get_context))
        .route("/rest/auth/config", get(get_auth_config))
        .route("/rest/service-providers", get(get_service_providers))
        .route("/rest/login/callback", post(login_callback))
        .route("/rest/logout", post(post_logout))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Configuration
    let config = PortalConfig::from_env();

    let kcp = match &config.kubeconfig_kcp {
        Some(path) => {
            let cluster = KcpCluster::load(path)
                .map_err(|e| anyhow::anyhow!("failed to load KCP kubeconfig: {e}"))?;
            info!(server = %cluster.server, "KCP cluster configured");
            Some(KcpService::new(&cluster, reqwest::Client::new())?)
        }
        None => {
            info!("no KUBECONFIG_KCP configured, workspace features disabled");
            None
        }
    };

    if let Some(base_domain) = &config.base_domain {
        info!(base_domain = %base_domain, "tenant base domain configured");
    }

    let listen_port = config.listen_port;
    let state = Arc::new(AppState::new(config, kcp));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{listen_port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "portal service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    fn test_state(config: PortalConfig) -> Arc<AppState> {
        Arc::new(AppState::new(config, None))
    }

    fn test_config() -> PortalConfig {
        PortalConfig {
            base_domain: Some("example.com".into()),
            default_client_id: Some("portal-default".into()),
            ..PortalConfig::default()
        }
    }

    #[tokio::test]
    async fn context_endpoint_returns_tenant_fields() {
        let server = TestServer::new(build_router(test_state(test_config()))).unwrap();

        let response = server
            .get("/rest/context")
            .add_header("host", "team1.example.com")
            .await;
        response.assert_status_ok();

        let json: serde_json::Value = response.json();
        assert_eq!(json["organization"], "team1");
        assert_eq!(json["isSubDomain"], true);
    }

    #[tokio::test]
    async fn context_endpoint_substitutes_templates() {
        let mut config = test_config();
        config.portal_context.insert(
            "crdGatewayApiUrl".into(),
            "https://${org-subdomain}api.example.com/${org-name}/graphql".into(),
        );
        let server = TestServer::new(build_router(test_state(config))).unwrap();

        let response = server
            .get("/rest/context")
            .add_header("host", "team1.example.com")
            .await;
        let json: serde_json::Value = response.json();
        assert_eq!(
            json["crdGatewayApiUrl"],
            "https://team1.api.example.com/team1/graphql"
        );
    }

    #[tokio::test]
    async fn service_providers_without_token_is_rejected() {
        let server = TestServer::new(build_router(test_state(test_config()))).unwrap();

        let response = server
            .get("/rest/service-providers")
            .add_header("host", "team1.example.com")
            .await;
        response.assert_status_bad_request();

        let json: serde_json::Value = response.json();
        assert_eq!(json["message"], "Token is required");
        assert_eq!(json["statusCode"], 400);
    }

    #[tokio::test]
    async fn service_providers_on_base_domain_returns_welcome() {
        let server = TestServer::new(build_router(test_state(test_config()))).unwrap();

        let response = server
            .get("/rest/service-providers")
            .add_header("host", "example.com")
            .add_header("authorization", "Bearer some-token")
            .await;
        response.assert_status_ok();

        let json: serde_json::Value = response.json();
        let node = &json["rawServiceProviders"][0]["contentConfiguration"][0]
            ["luigiConfigFragment"]["data"]["nodes"][0];
        assert_eq!(node["pathSegment"], "welcome");
    }

    #[tokio::test]
    async fn invalid_tenant_label_is_not_found() {
        let server = TestServer::new(build_router(test_state(test_config()))).unwrap();

        let response = server
            .get("/rest/context")
            .add_header("host", "Bad_Org.example.com")
            .await;
        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn auth_config_redacts_client_secret() {
        let mut config = test_config();
        config.idps.insert(
            "team1".into(),
            crate::config::IdpConfig {
                base_url: "https://idp.example.com/auth".into(),
                token_url: "https://idp.example.com/token".into(),
                client_id: "team1-client".into(),
                client_secret: "s3cret".into(),
                end_session_url: None,
            },
        );
        let server = TestServer::new(build_router(test_state(config))).unwrap();

        let response = server
            .get("/rest/auth/config")
            .add_header("host", "team1.example.com")
            .await;
        response.assert_status_ok();

        let json: serde_json::Value = response.json();
        assert_eq!(json["clientId"], "team1-client");
        assert_eq!(json["hasClientSecret"], true);
        assert!(json.get("clientSecret").is_none());
    }

    #[tokio::test]
    async fn login_callback_always_succeeds() {
        let server = TestServer::new(build_router(test_state(test_config()))).unwrap();

        let response = server
            .post("/rest/login/callback")
            .add_header("host", "team1.example.com")
            .json(&json!({ "id_token": "tok" }))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);
    }
}
