//! Tenant resolution from request hostnames.
//!
//! The portal runs either single-domain (every request on the base domain)
//! or subdomain-per-tenant (`<org>.<base-domain>`). The first DNS label of
//! the hostname is the organization candidate; a request on the bare base
//! domain resolves to the configured default client id instead.

use meshportal_models::{OrganizationId, TenantIdentity};

use crate::config::PortalConfig;
use crate::error::PortalError;

/// Placeholder substituted with the organization in URL templates.
pub const ORG_NAME_PLACEHOLDER: &str = "${org-name}";

/// Derive the tenant identity for a request hostname.
///
/// With `LOCAL_DEVELOPMENT_ORGANIZATION` set, every request resolves to
/// that fixed organization (treated as a subdomain tenant).
///
/// Single-label hostnames (e.g. `localhost`) degrade to treating the whole
/// hostname as the organization candidate. Candidates are allow-listed to
/// RFC 1123 label characters before they can reach a Kubernetes path or
/// Secret name; anything else is a [`PortalError::TenantUnresolvable`].
pub fn resolve(hostname: &str, config: &PortalConfig) -> Result<TenantIdentity, PortalError> {
    let base_domain = config.base_domain.clone().unwrap_or_default();

    if let Some(local_org) = &config.local_organization {
        return Ok(TenantIdentity {
            organization: Some(OrganizationId::new(local_org)),
            base_domain,
            is_sub_domain: true,
        });
    }

    if hostname == base_domain {
        return Ok(TenantIdentity {
            organization: config.default_client_id.as_deref().map(OrganizationId::new),
            base_domain,
            is_sub_domain: false,
        });
    }

    let candidate = hostname.split('.').next().unwrap_or_default();
    let organization = OrganizationId::from_label(candidate)
        .map_err(|e| PortalError::TenantUnresolvable(e.to_string()))?;

    Ok(TenantIdentity {
        organization: Some(organization),
        base_domain,
        is_sub_domain: true,
    })
}

/// Render the per-tenant OIDC discovery URL.
///
/// Substitutes [`ORG_NAME_PLACEHOLDER`] in the configured template.
/// `None` when no template is configured or no organization resolved;
/// callers fall through to the static default endpoints.
pub fn discovery_endpoint(tenant: &TenantIdentity, config: &PortalConfig) -> Option<String> {
    let template = config.discovery_endpoint.as_deref()?;
    let organization = tenant.organization.as_ref()?;
    Some(template.replace(ORG_NAME_PLACEHOLDER, organization.as_str()))
}

/// The `${org-subdomain}` substitution value: `"<org>."` on subdomain
/// requests, empty on the base domain.
pub fn subdomain_prefix(tenant: &TenantIdentity) -> String {
    match (&tenant.organization, tenant.is_sub_domain) {
        (Some(org), true) => format!("{org}."),
        _ => String::new(),
    }
}
