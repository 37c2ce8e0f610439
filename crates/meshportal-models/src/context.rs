//! The merged per-request portal context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tenant::OrganizationId;

/// Context assembled for one inbound request.
///
/// Merges query parameters, the projected portal template context and the
/// tenant identity. Built once per request and discarded after use.
///
/// Known fields are typed; everything else (projected
/// `OPENMFP_PORTAL_CONTEXT_*` values, unrecognized query parameters) rides
/// in the flattened `extra` bag so unknown template keys keep flowing to
/// the frontend.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Nested account within the organization workspace, from the
    /// `core_platform-mesh_io_account` query parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// The resolved organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationId>,
    /// GraphQL gateway URL with tenant placeholders substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crd_gateway_api_url: Option<String>,
    /// IAM service URL with tenant placeholders substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_service_api_url: Option<String>,
    /// Public Kubernetes workspace URL for the tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kcp_workspace_url: Option<String>,
    /// Whether the request arrived on a tenant subdomain.
    #[serde(default)]
    pub is_sub_domain: bool,
    /// Passthrough bag for unmodelled context keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_flat_with_extras() {
        let mut ctx = RequestContext {
            organization: Some(OrganizationId::new("team1")),
            is_sub_domain: true,
            ..Default::default()
        };
        ctx.extra
            .insert("featureToggles".into(), "a,b".into());

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["organization"], "team1");
        assert_eq!(json["isSubDomain"], true);
        assert_eq!(json["featureToggles"], "a,b");
        assert!(json.get("account").is_none());
    }

    #[test]
    fn deserializes_unknown_keys_into_extra() {
        let ctx: RequestContext = serde_json::from_str(
            r#"{"organization":"team1","isSubDomain":true,"custom":"x"}"#,
        )
        .unwrap();
        assert_eq!(ctx.organization, Some(OrganizationId::new("team1")));
        assert_eq!(ctx.extra["custom"], "x");
    }
}
