//! Content configurations and service provider responses.
//!
//! A *content configuration* is a custom resource describing dynamic
//! navigation/UI fragments for one entity type. The actual payload is
//! embedded in the resource's status as a JSON string
//! (`configurationResult`); [`ContentConfiguration::parse`] decodes it and
//! applies the spec-level URL fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// ContentConfiguration
// ---------------------------------------------------------------------------

/// One decoded content-configuration payload.
///
/// Unknown keys are preserved in `extra` so payload fields this crate does
/// not model pass through to the frontend untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentConfiguration {
    /// Name of the configuration, when the payload carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// URL the frontend loads the fragment from. When the payload omits
    /// it, the resource's spec-level remote-configuration URL is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Creation timestamp, when the payload carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    /// The Luigi navigation fragment itself. Opaque to the backend.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub luigi_config_fragment: Value,
    /// Passthrough for payload keys this crate does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ContentConfiguration {
    /// Decode the `configurationResult` JSON string of one resource.
    ///
    /// * A missing or empty `raw` string is a hard error referencing the
    ///   resource name.
    /// * Malformed JSON is reported per item, not retried.
    /// * When the decoded payload has no `url`, `fallback_url` (the
    ///   resource's `spec.remoteConfiguration.url`) is used verbatim.
    pub fn parse(
        resource: &str,
        raw: Option<&str>,
        fallback_url: Option<&str>,
    ) -> Result<Self, ModelError> {
        let raw = raw
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ModelError::MissingConfigurationResult {
                resource: resource.to_string(),
            })?;

        let mut config: ContentConfiguration = serde_json::from_str(raw).map_err(|_| {
            ModelError::MalformedConfigurationResult {
                resource: resource.to_string(),
            }
        })?;

        if config.url.is_none() {
            config.url = fallback_url.map(str::to_string);
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// ContentConfigurationResource
// ---------------------------------------------------------------------------

/// Label carrying the entity type of a content-configuration resource.
pub const ENTITY_LABEL: &str = "ui.platform-mesh.io/entity";

/// Wire shape of a `contentconfigurations.core.openmfp.io` custom
/// resource, as returned by both the raw Kubernetes API and the GraphQL
/// gateway.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ContentConfigurationResource {
    /// Resource metadata (name and labels).
    #[serde(default)]
    pub metadata: ResourceMetadata,
    /// Resource spec.
    #[serde(default)]
    pub spec: ContentConfigurationSpec,
    /// Resource status, carrying the rendered configuration.
    #[serde(default)]
    pub status: ContentConfigurationStatus,
}

/// Name and labels of a custom resource.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResourceMetadata {
    /// Resource name.
    #[serde(default)]
    pub name: String,
    /// Resource labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Spec of a content-configuration resource.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentConfigurationSpec {
    /// Remote location of the configuration, used as the URL fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_configuration: Option<RemoteConfiguration>,
}

/// Remote configuration pointer within a resource spec.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RemoteConfiguration {
    /// URL of the remote configuration document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Status of a content-configuration resource.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentConfigurationStatus {
    /// The rendered configuration as an embedded JSON string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_result: Option<String>,
}

impl ContentConfigurationResource {
    /// The entity type this resource is labelled with, if any.
    pub fn entity(&self) -> Option<&str> {
        self.metadata.labels.get(ENTITY_LABEL).map(String::as_str)
    }

    /// Decode this resource's embedded configuration, applying the
    /// spec-level URL fallback.
    pub fn decode(&self) -> Result<ContentConfiguration, ModelError> {
        ContentConfiguration::parse(
            &self.metadata.name,
            self.status.configuration_result.as_deref(),
            self.spec
                .remote_configuration
                .as_ref()
                .and_then(|r| r.url.as_deref()),
        )
    }
}

// ---------------------------------------------------------------------------
// ServiceProviderResponse
// ---------------------------------------------------------------------------

/// One named provider entry aggregating content configurations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProvider {
    /// Provider name.
    pub name: String,
    /// Display name shown in the frontend. Empty for system providers.
    pub display_name: String,
    /// Creation timestamp. Empty for system providers.
    pub creation_timestamp: String,
    /// Content configurations belonging to this provider.
    pub content_configuration: Vec<ContentConfiguration>,
}

/// Response of a service-provider resolver: an ordered collection of
/// named provider entries. Produced fresh per request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderResponse {
    /// All resolved providers.
    pub raw_service_providers: Vec<ServiceProvider>,
}

/// Name of the synthetic provider entry all resolved content
/// configurations are aggregated under.
pub const SYSTEM_PROVIDER_NAME: &str = "openmfp-system";

impl ServiceProviderResponse {
    /// Wrap content configurations in the single system provider entry.
    pub fn from_content_configurations(configs: Vec<ContentConfiguration>) -> Self {
        Self {
            raw_service_providers: vec![ServiceProvider {
                name: SYSTEM_PROVIDER_NAME.to_string(),
                display_name: String::new(),
                creation_timestamp: String::new(),
                content_configuration: configs,
            }],
        }
    }
}

/// The static "welcome" configuration returned for base-domain requests.
///
/// A single hidden navigation node bootstrapping the welcome web component;
/// no backend is contacted to produce it.
pub fn welcome_service_providers() -> ServiceProviderResponse {
    let fragment = json!({
        "data": {
            "nodes": [
                {
                    "entityType": "global",
                    "pathSegment": "welcome",
                    "hideFromNav": true,
                    "hideSideNav": true,
                    "order": 1,
                    "url": "/assets/platform-mesh-portal-ui-wc.js#welcome-view",
                    "webcomponent": {
                        "selfRegistered": true
                    },
                    "context": { "kcpPath": "root:orgs" }
                }
            ]
        }
    });

    ServiceProviderResponse::from_content_configurations(vec![ContentConfiguration {
        name: Some(SYSTEM_PROVIDER_NAME.to_string()),
        url: None,
        creation_timestamp: Some(String::new()),
        luigi_config_fragment: fragment,
        extra: BTreeMap::new(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_missing_configuration_result() {
        let err = ContentConfiguration::parse("account-ui", None, None).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingConfigurationResult {
                resource: "account-ui".into()
            }
        );

        let err = ContentConfiguration::parse("account-ui", Some(""), None).unwrap_err();
        assert!(matches!(err, ModelError::MissingConfigurationResult { .. }));
    }

    #[test]
    fn parse_malformed_json() {
        let err =
            ContentConfiguration::parse("account-ui", Some("{not json"), None).unwrap_err();
        assert_eq!(
            err,
            ModelError::MalformedConfigurationResult {
                resource: "account-ui".into()
            }
        );
    }

    #[test]
    fn parse_empty_object_takes_fallback_url() {
        let config =
            ContentConfiguration::parse("account-ui", Some("{}"), Some("http://remote")).unwrap();
        assert_eq!(config.url.as_deref(), Some("http://remote"));
    }

    #[test]
    fn parse_keeps_existing_url() {
        let raw = r#"{"url":"http://inline"}"#;
        let config =
            ContentConfiguration::parse("account-ui", Some(raw), Some("http://remote")).unwrap();
        assert_eq!(config.url.as_deref(), Some("http://inline"));
    }

    #[test]
    fn parse_without_fallback_leaves_url_unset() {
        let config = ContentConfiguration::parse("account-ui", Some("{}"), None).unwrap();
        assert!(config.url.is_none());
    }

    #[test]
    fn parse_preserves_unknown_keys() {
        let raw = r#"{"url":"http://inline","viewGroup":"accounts"}"#;
        let config = ContentConfiguration::parse("account-ui", Some(raw), None).unwrap();
        assert_eq!(config.extra["viewGroup"], json!("accounts"));

        let round = serde_json::to_value(&config).unwrap();
        assert_eq!(round["viewGroup"], json!("accounts"));
    }

    #[test]
    fn resource_decode_applies_spec_fallback() {
        let resource: ContentConfigurationResource = serde_json::from_value(json!({
            "metadata": {
                "name": "account-ui",
                "labels": { "ui.platform-mesh.io/entity": "main" }
            },
            "spec": { "remoteConfiguration": { "url": "http://remote" } },
            "status": { "configurationResult": "{}" }
        }))
        .unwrap();

        assert_eq!(resource.entity(), Some("main"));
        let config = resource.decode().unwrap();
        assert_eq!(config.url.as_deref(), Some("http://remote"));
    }

    #[test]
    fn resource_decode_without_result_fails() {
        let resource: ContentConfigurationResource = serde_json::from_value(json!({
            "metadata": { "name": "account-ui" }
        }))
        .unwrap();
        assert!(matches!(
            resource.decode(),
            Err(ModelError::MissingConfigurationResult { .. })
        ));
    }

    #[test]
    fn welcome_has_single_system_provider() {
        let welcome = welcome_service_providers();
        assert_eq!(welcome.raw_service_providers.len(), 1);
        let provider = &welcome.raw_service_providers[0];
        assert_eq!(provider.name, SYSTEM_PROVIDER_NAME);
        assert_eq!(provider.content_configuration.len(), 1);

        let node = &provider.content_configuration[0].luigi_config_fragment["data"]["nodes"][0];
        assert_eq!(node["pathSegment"], "welcome");
        assert_eq!(node["context"]["kcpPath"], "root:orgs");
        assert_eq!(
            node["url"],
            "/assets/platform-mesh-portal-ui-wc.js#welcome-view"
        );
    }

    #[test]
    fn response_serializes_camel_case() {
        let json = serde_json::to_value(welcome_service_providers()).unwrap();
        assert!(json["rawServiceProviders"].is_array());
        assert_eq!(
            json["rawServiceProviders"][0]["contentConfiguration"][0]["creationTimestamp"],
            ""
        );
    }
}
