//! Inbound request projection.
//!
//! [`RequestInfo`] captures the parts of an HTTP request the providers
//! consume: hostname, query parameters and a handful of headers. It is an
//! Axum extractor so handlers can take it as a plain argument, and a plain
//! struct so tests can construct it directly.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Name of the cookie carrying the refresh token.
pub const AUTH_COOKIE: &str = "openmfp_auth_cookie";

/// Query parameter selecting a nested account within the organization.
pub const ACCOUNT_QUERY_PARAM: &str = "core_platform-mesh_io_account";

/// The request attributes consumed by the provider modules.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// Hostname from the `Host` header, without any port.
    pub hostname: String,
    /// Raw `Host` header value, port included when present.
    pub host_header: Option<String>,
    /// `x-forwarded-port` header value.
    pub forwarded_port: Option<String>,
    /// Bearer token from the `Authorization` header.
    pub bearer_token: Option<String>,
    /// Parsed request cookies.
    pub cookies: BTreeMap<String, String>,
    /// Parsed query parameters.
    pub query: BTreeMap<String, String>,
}

impl RequestInfo {
    /// Convenience constructor used by tests.
    pub fn for_host(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            host_header: Some(hostname.to_string()),
            ..Self::default()
        }
    }

    /// The nested account selected via query parameter, if any.
    pub fn account(&self) -> Option<&str> {
        self.query.get(ACCOUNT_QUERY_PARAM).map(String::as_str)
    }

    /// The refresh token cookie, if present.
    pub fn auth_cookie(&self) -> Option<&str> {
        self.cookies.get(AUTH_COOKIE).map(String::as_str)
    }
}

impl<S> FromRequestParts<S> for RequestInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let host_header = header("host");
        let hostname = host_header
            .as_deref()
            .map(strip_port)
            .unwrap_or_default()
            .to_string();

        let bearer_token = header("authorization")
            .as_deref()
            .and_then(parse_bearer)
            .map(str::to_string);

        let cookies = header("cookie").map(|v| parse_cookies(&v)).unwrap_or_default();
        let query = parts
            .uri
            .query()
            .map(parse_query)
            .unwrap_or_default();

        Ok(Self {
            hostname,
            host_header,
            forwarded_port: header("x-forwarded-port"),
            bearer_token,
            cookies,
            query,
        })
    }
}

/// Strip a trailing `:port` from a `Host` header value.
fn strip_port(host: &str) -> &str {
    host.rsplit_once(':')
        .filter(|(_, port)| port.bytes().all(|b| b.is_ascii_digit()))
        .map_or(host, |(name, _)| name)
}

fn parse_bearer(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn parse_cookies(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
