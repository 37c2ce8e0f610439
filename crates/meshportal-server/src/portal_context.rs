//! Portal and request context assembly.
//!
//! Builds the merged [`RequestContext`] for one inbound request: query
//! parameters, the projected `OPENMFP_PORTAL_CONTEXT_*` template context
//! with tenant placeholders substituted, the tenant's public workspace URL
//! and the tenant identity itself.

use meshportal_models::{RequestContext, TenantIdentity};

use crate::config::PortalConfig;
use crate::domain::{self, ORG_NAME_PLACEHOLDER};
use crate::error::PortalError;
use crate::kcp::{self, KcpService};
use crate::request::RequestInfo;

/// Placeholder substituted with `"<org>."` on subdomains, `""` otherwise.
pub const ORG_SUBDOMAIN_PLACEHOLDER: &str = "${org-subdomain}";

/// Substitute tenant placeholders in one template value.
///
/// Values without placeholders pass through unchanged.
fn substitute(value: &str, tenant: &TenantIdentity) -> String {
    let with_subdomain = value.replace(ORG_SUBDOMAIN_PLACEHOLDER, &domain::subdomain_prefix(tenant));
    match &tenant.organization {
        Some(org) => with_subdomain.replace(ORG_NAME_PLACEHOLDER, org.as_str()),
        None => with_subdomain,
    }
}

/// Build the merged request context.
///
/// Merge order: query parameters first, then the substituted portal
/// template context (template values win over query parameters of the
/// same name), then the computed tenant fields.
pub fn build_request_context(
    config: &PortalConfig,
    kcp: Option<&KcpService>,
    request: &RequestInfo,
) -> Result<RequestContext, PortalError> {
    let tenant = domain::resolve(&request.hostname, config)?;

    let mut context = RequestContext {
        account: request.account().map(str::to_string),
        organization: tenant.organization.clone(),
        is_sub_domain: tenant.is_sub_domain,
        ..RequestContext::default()
    };

    for (key, value) in &request.query {
        if key != crate::request::ACCOUNT_QUERY_PARAM {
            context.extra.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in &config.portal_context {
        let value = substitute(value, &tenant);
        match key.as_str() {
            "crdGatewayApiUrl" => context.crd_gateway_api_url = Some(value),
            "iamServiceApiUrl" => context.iam_service_api_url = Some(value),
            _ => {
                context.extra.insert(key.clone(), value);
            }
        }
    }

    // Only advertise a workspace URL when a KCP cluster is configured.
    if kcp.is_some() {
        if let Some(org) = &tenant.organization {
            let port = kcp::resolve_public_port(config, request);
            context.kcp_workspace_url = Some(KcpService::public_workspace_url(
                org,
                context.account.as_deref(),
                &tenant.base_domain,
                port.as_deref(),
            ));
        }
    }

    Ok(context)
}
