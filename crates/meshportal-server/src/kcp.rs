//! KCP Kubernetes workspace URLs and API client.
//!
//! KCP scopes resources to hierarchical workspaces. One organization maps
//! to the workspace path `root:orgs:<organization>`, optionally nested one
//! level deeper per account. This module renders that path as the three URL
//! flavours the portal needs and wraps the raw API calls (custom-resource
//! listing, Secret reads) over the cluster from `KUBECONFIG_KCP`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use meshportal_models::{ContentConfigurationResource, ENTITY_LABEL, OrganizationId};
use serde::Deserialize;

use crate::config::PortalConfig;
use crate::discovery::origin;
use crate::error::PortalError;
use crate::request::RequestInfo;

/// Namespace holding the per-tenant portal client Secrets.
const SECRET_NAMESPACE: &str = "platform-mesh-system";

/// Key within the Secret data carrying the client secret.
const SECRET_KEY: &str = "attribute.client_secret";

// ---------------------------------------------------------------------------
// Kubeconfig
// ---------------------------------------------------------------------------

/// The cluster endpoint resolved from a kubeconfig: API server URL plus
/// the bearer token of the selected user, when one is configured.
#[derive(Debug, Clone)]
pub struct KcpCluster {
    /// API server base URL.
    pub server: String,
    /// Bearer token of the kubeconfig user, if any.
    pub token: Option<String>,
}

#[derive(Deserialize)]
struct Kubeconfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context", default)]
    current_context: Option<String>,
}

#[derive(Deserialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Deserialize)]
struct ClusterEntry {
    server: String,
}

#[derive(Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserEntry,
}

#[derive(Deserialize, Default)]
struct UserEntry {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Deserialize)]
struct ContextEntry {
    cluster: String,
    #[serde(default)]
    user: Option<String>,
}

impl KcpCluster {
    /// Load the cluster endpoint from a kubeconfig file.
    ///
    /// Resolves the current context (falling back to the first cluster when
    /// none is selected) and picks up that context's user token.
    pub fn load(path: &str) -> Result<Self, PortalError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PortalError::Config(format!("cannot read kubeconfig {path}: {e}")))?;
        let kubeconfig: Kubeconfig = serde_yaml::from_str(&raw)
            .map_err(|e| PortalError::Config(format!("cannot parse kubeconfig {path}: {e}")))?;

        let context = kubeconfig
            .current_context
            .as_deref()
            .and_then(|name| kubeconfig.contexts.iter().find(|c| c.name == name));

        let cluster_name = context.map(|c| c.context.cluster.as_str());
        let cluster = match cluster_name {
            Some(name) => kubeconfig.clusters.iter().find(|c| c.name == name),
            None => kubeconfig.clusters.first(),
        }
        .ok_or_else(|| PortalError::Config(format!("kubeconfig {path} has no usable cluster")))?;

        let token = context
            .and_then(|c| c.context.user.as_deref())
            .and_then(|name| kubeconfig.users.iter().find(|u| u.name == name))
            .and_then(|u| u.user.token.clone());

        Ok(Self {
            server: cluster.cluster.server.clone(),
            token,
        })
    }
}

// ---------------------------------------------------------------------------
// KcpService
// ---------------------------------------------------------------------------

/// Workspace URL builder and API client for the KCP cluster.
#[derive(Debug, Clone)]
pub struct KcpService {
    base_origin: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl KcpService {
    /// Create the service from a resolved cluster endpoint.
    pub fn new(cluster: &KcpCluster, http: reqwest::Client) -> Result<Self, PortalError> {
        let base_origin = origin(&cluster.server).ok_or_else(|| {
            PortalError::Config(format!("invalid KCP server URL: {}", cluster.server))
        })?;
        Ok(Self {
            base_origin,
            token: cluster.token.clone(),
            http,
        })
    }

    /// Build the hierarchical workspace path
    /// `root:orgs:<organization>[:<account>]`.
    pub fn workspace_path(organization: &OrganizationId, account: Option<&str>) -> String {
        match account {
            Some(account) if !account.is_empty() => {
                format!("root:orgs:{organization}:{account}")
            }
            _ => format!("root:orgs:{organization}"),
        }
    }

    /// Internal cluster API URL for direct API client use.
    pub fn workspace_url(&self, organization: &OrganizationId, account: Option<&str>) -> String {
        let path = Self::workspace_path(organization, account);
        format!("{}/clusters/{path}", self.base_origin)
    }

    /// Internal virtual-workspace URL for content-configuration queries.
    pub fn virtual_workspace_url(
        &self,
        organization: &OrganizationId,
        account: Option<&str>,
    ) -> String {
        let path = Self::workspace_path(organization, account);
        format!(
            "{}/services/contentconfigurations/clusters/{path}",
            self.base_origin
        )
    }

    /// Public-facing workspace URL handed to clients.
    pub fn public_workspace_url(
        organization: &OrganizationId,
        account: Option<&str>,
        base_domain: &str,
        port: Option<&str>,
    ) -> String {
        let path = Self::workspace_path(organization, account);
        match port {
            Some(port) => format!("https://kcp.api.{base_domain}:{port}/clusters/{path}"),
            None => format!("https://kcp.api.{base_domain}/clusters/{path}"),
        }
    }

    /// List the `contentconfigurations` custom resources of a workspace,
    /// filtered by entity label.
    ///
    /// The caller's bearer token is forwarded; the kubeconfig token is the
    /// fallback. A 429 surfaces as [`PortalError::RateLimited`] so callers
    /// can apply the retry policy.
    pub async fn list_content_configurations(
        &self,
        organization: &OrganizationId,
        account: Option<&str>,
        entity: &str,
        token: &str,
    ) -> Result<Vec<ContentConfigurationResource>, PortalError> {
        let url = format!(
            "{}/apis/core.openmfp.io/v1alpha1/contentconfigurations",
            self.workspace_url(organization, account)
        );

        let bearer = if token.is_empty() {
            self.token.as_deref().unwrap_or_default()
        } else {
            token
        };

        let response = self
            .http
            .get(&url)
            .query(&[("labelSelector", format!("{ENTITY_LABEL}={entity}"))])
            .bearer_auth(bearer)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PortalError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::Upstream(format!(
                "listing content configurations failed with {status}: {body}"
            )));
        }

        #[derive(Deserialize)]
        struct List {
            #[serde(default)]
            items: Vec<ContentConfigurationResource>,
        }

        let list: List = response.json().await?;
        Ok(list.items)
    }

    /// Read the tenant client secret `portal-client-secret-<organization>`
    /// and base64-decode its `attribute.client_secret` entry.
    ///
    /// Failures are logged with the upstream error body and propagated; the
    /// auth provider collapses them into its incomplete-config error.
    pub async fn read_client_secret(
        &self,
        organization: &OrganizationId,
    ) -> Result<String, PortalError> {
        let secret_name = format!("portal-client-secret-{organization}");
        let url = format!(
            "{}/api/v1/namespaces/{SECRET_NAMESPACE}/secrets/{secret_name}",
            self.base_origin
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token.as_deref().unwrap_or_default())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(secret = %secret_name, error = %e, "failed to fetch secret");
                PortalError::Upstream(format!("failed to fetch secret {secret_name}: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(secret = %secret_name, %status, body = %body, "failed to fetch secret");
            return Err(PortalError::Upstream(format!(
                "failed to fetch secret {secret_name}: {status}"
            )));
        }

        #[derive(Deserialize)]
        struct Secret {
            #[serde(default)]
            data: std::collections::BTreeMap<String, String>,
        }

        let secret: Secret = response.json().await?;
        let encoded = secret.data.get(SECRET_KEY).ok_or_else(|| {
            PortalError::Upstream(format!("secret {secret_name} has no {SECRET_KEY} entry"))
        })?;

        let decoded = BASE64.decode(encoded).map_err(|e| {
            PortalError::Upstream(format!("secret {secret_name} is not valid base64: {e}"))
        })?;
        String::from_utf8(decoded).map_err(|e| {
            PortalError::Upstream(format!("secret {secret_name} is not valid UTF-8: {e}"))
        })
    }
}

/// Select the port for public-facing URLs.
///
/// Preference order: `FRONTEND_PORT` override, then the `x-forwarded-port`
/// header, then the port embedded in the `Host` header. The port is
/// omitted entirely when it resolves to 80, 443 or empty.
pub fn resolve_public_port(config: &PortalConfig, request: &RequestInfo) -> Option<String> {
    let host_port = request
        .host_header
        .as_deref()
        .and_then(|host| host.rsplit_once(':'))
        .filter(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
        .map(|(_, port)| port.to_string());

    config
        .frontend_port
        .clone()
        .or_else(|| request.forwarded_port.clone())
        .or(host_port)
        .filter(|port| !matches!(port.as_str(), "" | "80" | "443"))
}
