//! Service-provider resolution.
//!
//! Two interchangeable resolvers fetch the tenant's content-configuration
//! resources: one through the Kubernetes GraphQL gateway, one straight
//! against the KCP custom-resource API. Both share the same contract:
//!
//! * a bearer token is required,
//! * base-domain requests short-circuit to the static welcome
//!   configuration without contacting any backend,
//! * a 429 from the backend is retried exactly once after a fixed
//!   one-second delay,
//! * every returned resource must carry a decodable
//!   `configurationResult`; one bad item aborts the whole fetch.

use std::time::Duration;

use meshportal_models::{
    ContentConfigurationResource, RequestContext, ServiceProviderResponse,
    welcome_service_providers,
};
use serde_json::json;

use crate::error::PortalError;
use crate::kcp::KcpService;

/// Fixed backoff before the single retry on rate-limiting.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Entity queried when the caller supplies none.
const DEFAULT_ENTITY: &str = "main";

// ---------------------------------------------------------------------------
// Shared contract
// ---------------------------------------------------------------------------

/// Run `call`, retrying exactly once after [`RETRY_DELAY`] when the first
/// attempt was rate-limited. Any other error, and any error on the second
/// attempt, propagates.
async fn with_rate_limit_retry<F, Fut, T>(mut call: F) -> Result<T, PortalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PortalError>>,
{
    match call().await {
        Ok(value) => Ok(value),
        Err(PortalError::RateLimited) => {
            tracing::warn!("backend rate limited, retrying once after 1s");
            tokio::time::sleep(RETRY_DELAY).await;
            call().await
        }
        Err(other) => Err(other),
    }
}

/// Validate the shared preconditions and apply the welcome short-circuit.
///
/// `Ok(Some(response))` means the caller must return `response` without
/// contacting any backend.
fn check_preconditions(
    token: &str,
    context: &RequestContext,
) -> Result<Option<ServiceProviderResponse>, PortalError> {
    if token.is_empty() {
        return Err(PortalError::MissingToken);
    }
    if !context.is_sub_domain {
        return Ok(Some(welcome_service_providers()));
    }
    if context.organization.is_none() {
        return Err(PortalError::MissingOrganization);
    }
    Ok(None)
}

fn resolve_entity(entities: &[String]) -> &str {
    entities.first().map_or(DEFAULT_ENTITY, String::as_str)
}

/// Decode the fetched resources and aggregate them under the single
/// system provider entry. No partial results: the first undecodable item
/// fails the whole response.
fn shape_response(
    resources: Vec<ContentConfigurationResource>,
) -> Result<ServiceProviderResponse, PortalError> {
    let configs = resources
        .iter()
        .map(|resource| resource.decode().map_err(PortalError::from))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ServiceProviderResponse::from_content_configurations(configs))
}

// ---------------------------------------------------------------------------
// Kubernetes-backed resolver
// ---------------------------------------------------------------------------

/// Resolver listing content configurations straight from the KCP
/// custom-resource API, filtered server-side via label selector.
#[derive(Debug, Clone)]
pub struct KubernetesServiceProviders {
    kcp: KcpService,
}

impl KubernetesServiceProviders {
    /// Create the resolver over an existing KCP service.
    pub fn new(kcp: KcpService) -> Self {
        Self { kcp }
    }

    /// Fetch the tenant's content configurations for the first requested
    /// entity (default `"main"`).
    pub async fn get_service_providers(
        &self,
        token: &str,
        entities: &[String],
        context: &RequestContext,
    ) -> Result<ServiceProviderResponse, PortalError> {
        if let Some(welcome) = check_preconditions(token, context)? {
            return Ok(welcome);
        }
        // Non-None after check_preconditions.
        let Some(organization) = context.organization.clone() else {
            return Err(PortalError::MissingOrganization);
        };
        let entity = resolve_entity(entities);

        let resources = with_rate_limit_retry(|| {
            self.kcp.list_content_configurations(
                &organization,
                context.account.as_deref(),
                entity,
                token,
            )
        })
        .await?;

        shape_response(resources)
    }
}

// ---------------------------------------------------------------------------
// GraphQL-gateway-backed resolver
// ---------------------------------------------------------------------------

/// GraphQL document listing all content configurations of a workspace.
const CONTENT_CONFIGURATIONS_QUERY: &str = "\
query {
  ui_platform_mesh_io {
    ContentConfigurations {
      metadata {
        name
        labels
      }
      spec {
        remoteConfiguration {
          url
        }
      }
      status {
        configurationResult
      }
    }
  }
}";

/// Resolver querying the Kubernetes GraphQL gateway's virtual workspace,
/// filtered client-side by entity label.
#[derive(Debug, Clone)]
pub struct ContentConfigurationServiceProviders {
    http: reqwest::Client,
}

impl ContentConfigurationServiceProviders {
    /// Create the resolver with a long-lived HTTP client.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch the tenant's content configurations for the first requested
    /// entity (default `"main"`).
    pub async fn get_service_providers(
        &self,
        token: &str,
        entities: &[String],
        context: &RequestContext,
    ) -> Result<ServiceProviderResponse, PortalError> {
        if let Some(welcome) = check_preconditions(token, context)? {
            return Ok(welcome);
        }

        let url = gateway_url(context)?;
        let entity = resolve_entity(entities);

        let resources =
            with_rate_limit_retry(|| self.query_gateway(&url, token)).await?;

        let for_entity = resources
            .into_iter()
            .filter(|resource| resource.entity() == Some(entity))
            .collect();

        shape_response(for_entity)
    }

    async fn query_gateway(
        &self,
        url: &str,
        token: &str,
    ) -> Result<Vec<ContentConfigurationResource>, PortalError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "query": CONTENT_CONFIGURATIONS_QUERY }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PortalError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::Upstream(format!(
                "content-configuration query failed with {status}: {body}"
            )));
        }

        let body: serde_json::Value = response.json().await?;
        parse_gateway_response(body)
    }
}

/// Derive the virtual-workspace gateway URL from the request context.
fn gateway_url(context: &RequestContext) -> Result<String, PortalError> {
    let base = context
        .crd_gateway_api_url
        .as_deref()
        .ok_or_else(|| PortalError::Config("Context with crdGatewayApiUrl is required".into()))?;

    let mut url = base.replace(
        "kubernetes-graphql-gateway/root",
        "kubernetes-graphql-gateway/virtual-workspace/contentconfigurations/root",
    );
    if let Some(account) = context.account.as_deref().filter(|a| !a.is_empty()) {
        url = url.replace("/graphql", &format!(":{account}/graphql"));
    }
    Ok(url)
}

/// Pull the resource list out of the gateway's response envelope.
fn parse_gateway_response(
    body: serde_json::Value,
) -> Result<Vec<ContentConfigurationResource>, PortalError> {
    let items = body
        .pointer("/data/ui_platform_mesh_io/ContentConfigurations")
        .cloned()
        .ok_or_else(|| {
            PortalError::Upstream("Invalid response structure: missing ContentConfigurations".into())
        })?;
    serde_json::from_value(items).map_err(PortalError::from)
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// The resolver chosen at startup.
///
/// The GraphQL gateway is used whenever a `crdGatewayApiUrl` template is
/// configured; otherwise the portal talks to the KCP API directly.
#[derive(Debug, Clone)]
pub enum ServiceProviderBackend {
    /// Raw KCP custom-resource API.
    Kubernetes(KubernetesServiceProviders),
    /// Kubernetes GraphQL gateway.
    ContentConfiguration(ContentConfigurationServiceProviders),
}

impl ServiceProviderBackend {
    /// Dispatch to the selected resolver.
    pub async fn get_service_providers(
        &self,
        token: &str,
        entities: &[String],
        context: &RequestContext,
    ) -> Result<ServiceProviderResponse, PortalError> {
        match self {
            Self::Kubernetes(resolver) => {
                resolver.get_service_providers(token, entities, context).await
            }
            Self::ContentConfiguration(resolver) => {
                resolver.get_service_providers(token, entities, context).await
            }
        }
    }
}
