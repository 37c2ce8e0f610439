//! Logout handling.
//!
//! Preferred path: back-channel revocation of the refresh token against
//! the resolved end-session endpoint. When no refresh token is present or
//! revocation fails, the portal degrades to a front-channel logout URL
//! built from the caller's id token instead of failing the request.

use meshportal_models::AuthConfig;

use crate::error::PortalError;
use crate::request::RequestInfo;

/// Redirect target after a front-channel logout.
const POST_LOGOUT_REDIRECT: &str = "/login";

/// Outcome of a logout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The refresh token was revoked; nothing more to do.
    Revoked,
    /// Revocation was not possible; the caller should redirect the user
    /// to this front-channel logout URL.
    FrontChannel(String),
}

/// Run the logout flow for one request.
pub async fn handle_logout(
    http: &reqwest::Client,
    auth: &AuthConfig,
    request: &RequestInfo,
) -> Result<LogoutOutcome, PortalError> {
    let end_session_url = auth
        .end_session_url
        .as_deref()
        .ok_or_else(|| PortalError::LogoutFailed("no end-session URL resolved".into()))?;

    let Some(refresh_token) = request.auth_cookie() else {
        tracing::warn!("no refresh token found, falling back to front-channel logout");
        return front_channel(end_session_url, request);
    };

    let result = http
        .post(end_session_url)
        .form(&[
            ("client_id", auth.client_id.as_str()),
            ("client_secret", auth.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await;

    let failure = match result {
        Ok(response) if response.status().is_success() => {
            tracing::info!("refresh token revoked");
            return Ok(LogoutOutcome::Revoked);
        }
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            format!("revocation failed with {status}: {body}")
        }
        Err(e) => format!("revocation request failed: {e}"),
    };

    tracing::error!(error = %failure, "refresh token revocation failed");
    front_channel(end_session_url, request).map_err(|_| PortalError::LogoutFailed(failure))
}

/// Build the degraded front-channel logout URL from the caller's id token.
fn front_channel(
    end_session_url: &str,
    request: &RequestInfo,
) -> Result<LogoutOutcome, PortalError> {
    let id_token = request
        .bearer_token
        .as_deref()
        .ok_or_else(|| PortalError::LogoutFailed("no refresh token and no id token".into()))?;

    Ok(LogoutOutcome::FrontChannel(format!(
        "{end_session_url}?id_token_hint={}&post_logout_redirect_uri={}",
        url_encode(id_token),
        url_encode(POST_LOGOUT_REDIRECT),
    )))
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn url_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
