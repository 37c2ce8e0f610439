//! Tenant addressing types.
//!
//! A tenant ("organization") is a logical customer of the portal,
//! identified by the subdomain it is served under. Requests to the bare
//! base domain belong to the non-tenant-specific ("welcome") context.
//!
//! An [`OrganizationId`] names the organization itself. Because the value
//! ends up in Kubernetes workspace paths and Secret names, identifiers
//! derived from untrusted hostnames must go through
//! [`OrganizationId::from_label`], which enforces the RFC 1123 label
//! character set.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// OrganizationId
// ---------------------------------------------------------------------------

/// Identifier for an organization (tenant) in the portal.
///
/// # Examples
///
/// ```
/// use meshportal_models::OrganizationId;
///
/// let org = OrganizationId::new("team1");
/// assert_eq!(org.to_string(), "team1");
///
/// let org2: OrganizationId = "team1".into();
/// assert_eq!(org, org2);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    /// Create an `OrganizationId` from a trusted string (e.g. static
    /// configuration). No validation is performed.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Create an `OrganizationId` from an untrusted hostname label.
    ///
    /// The value is allow-listed to RFC 1123 label characters before it
    /// can reach a Kubernetes path or Secret name: lowercase ASCII
    /// letters, digits and `-`, at most 63 characters, and neither
    /// starting nor ending with `-`.
    pub fn from_label(label: &str) -> Result<Self, ModelError> {
        let invalid = |reason: &str| ModelError::InvalidOrganization {
            value: label.to_string(),
            reason: reason.to_string(),
        };

        if label.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if label.len() > 63 {
            return Err(invalid("must be at most 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("must not start or end with '-'"));
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(invalid(
                "must contain only lowercase letters, digits and '-'",
            ));
        }

        Ok(Self(label.to_string()))
    }

    /// Return the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrganizationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrganizationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for OrganizationId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// TenantIdentity
// ---------------------------------------------------------------------------

/// The tenant derived from an inbound request's hostname.
///
/// Derived once per request and never persisted.
///
/// Invariant: `organization` is the first DNS label of the hostname when
/// the hostname differs from the base domain, otherwise the configured
/// default client id. It is `None` only on base-domain requests with no
/// default client id configured; such requests still serve the static
/// welcome context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIdentity {
    /// The resolved organization, when one exists.
    pub organization: Option<OrganizationId>,
    /// The configured base domain the tenant hierarchy lives under.
    pub base_domain: String,
    /// `true` when the request hostname differs from the base domain.
    pub is_sub_domain: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_label_accepts_rfc1123() {
        assert!(OrganizationId::from_label("team1").is_ok());
        assert!(OrganizationId::from_label("a").is_ok());
        assert!(OrganizationId::from_label("my-org-42").is_ok());
    }

    #[test]
    fn from_label_rejects_empty() {
        assert!(OrganizationId::from_label("").is_err());
    }

    #[test]
    fn from_label_rejects_uppercase_and_specials() {
        assert!(OrganizationId::from_label("Team1").is_err());
        assert!(OrganizationId::from_label("team_1").is_err());
        assert!(OrganizationId::from_label("team.1").is_err());
        assert!(OrganizationId::from_label("te am").is_err());
    }

    #[test]
    fn from_label_rejects_hyphen_at_edges() {
        assert!(OrganizationId::from_label("-team").is_err());
        assert!(OrganizationId::from_label("team-").is_err());
    }

    #[test]
    fn from_label_rejects_overlong() {
        let long = "a".repeat(64);
        assert!(OrganizationId::from_label(&long).is_err());
        let ok = "a".repeat(63);
        assert!(OrganizationId::from_label(&ok).is_ok());
    }

    #[test]
    fn serde_is_transparent() {
        let org = OrganizationId::new("team1");
        let json = serde_json::to_string(&org).unwrap();
        assert_eq!(json, "\"team1\"");
        let back: OrganizationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, org);
    }
}
