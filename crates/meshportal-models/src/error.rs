//! Error types for the `meshportal-models` crate.
//!
//! All fallible constructors and parse functions in this crate return
//! variants of [`ModelError`].

/// Errors produced when constructing or validating model types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// An organization identifier was not a valid DNS label.
    #[error("invalid organization \"{value}\": {reason}")]
    InvalidOrganization {
        /// The value that failed validation.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A content-configuration resource carried no `configurationResult`.
    #[error("Missing configurationResult for item: {resource}")]
    MissingConfigurationResult {
        /// Name of the offending resource.
        resource: String,
    },

    /// The embedded `configurationResult` string was not valid JSON.
    #[error("Invalid JSON in configurationResult for item: {resource}")]
    MalformedConfigurationResult {
        /// Name of the offending resource.
        resource: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_organization() {
        let err = ModelError::InvalidOrganization {
            value: "Bad_Org".into(),
            reason: "must contain only lowercase letters, digits and '-'".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid organization \"Bad_Org\": must contain only lowercase letters, digits and '-'"
        );
    }

    #[test]
    fn error_display_missing_configuration_result() {
        let err = ModelError::MissingConfigurationResult {
            resource: "account-ui".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing configurationResult for item: account-ui"
        );
    }

    #[test]
    fn error_display_malformed_configuration_result() {
        let err = ModelError::MalformedConfigurationResult {
            resource: "account-ui".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid JSON in configurationResult for item: account-ui"
        );
    }
}
