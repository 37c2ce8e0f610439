//! IAM user registration.
//!
//! After a successful login the portal registers the user with the IAM
//! GraphQL service. Registration is best-effort: every failure is logged
//! and swallowed, the login flow never blocks on IAM.

use meshportal_models::RequestContext;
use serde_json::json;

/// GraphQL mutation registering the authenticated user.
const ADD_USER_MUTATION: &str = "\
mutation {
  user {
    login
  }
}";

/// Client for the IAM GraphQL service.
#[derive(Debug, Clone)]
pub struct IamService {
    http: reqwest::Client,
}

impl IamService {
    /// Create the service with a long-lived HTTP client.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Register the user carried by `id_token` with the IAM service.
    ///
    /// Uses the tenant-substituted `iamServiceApiUrl` from the request
    /// context. Never fails the caller.
    pub async fn add_user(&self, id_token: &str, context: &RequestContext) {
        let Some(url) = context.iam_service_api_url.as_deref() else {
            tracing::warn!("no iamServiceApiUrl in context, skipping IAM registration");
            return;
        };

        let result = self
            .http
            .post(url)
            .bearer_auth(id_token)
            .json(&json!({ "query": ADD_USER_MUTATION }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(url = %url, "user registered with IAM");
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!(url = %url, %status, body = %body, "IAM registration failed");
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "IAM registration failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_iam_url_is_swallowed() {
        let service = IamService::new(reqwest::Client::new());
        // Must not panic and must not attempt any request.
        service.add_user("token", &RequestContext::default()).await;
    }
}
