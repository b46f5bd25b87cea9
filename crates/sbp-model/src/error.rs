//! Error types for the SBP data model
//!
//! Every error here is an input error: construction is synchronous and
//! fail-closed, so none of them is retryable. The caller has to supply
//! corrected input.

/// Model construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Project identifier violates the naming grammar
    #[error("invalid project identifier '{value}': {reason}")]
    InvalidIdentifier {
        /// The rejected input, verbatim
        value: String,
        /// Which rule was broken
        reason: String,
    },

    /// A descriptor was requested without the descriptor it depends on
    #[error("missing dependency: {required} ({reason})")]
    MissingDependency {
        /// Name of the required descriptor
        required: String,
        /// Why the supplied value (if any) did not qualify
        reason: String,
    },

    /// Statement without actions or resources
    #[error("statement must name at least one action and one resource")]
    EmptyStatement,

    /// Unscoped `*` resource paired with a mutating action
    #[error("action '{action}' is not read-only and cannot target an unscoped resource")]
    UnscopedWildcard {
        /// The offending action
        action: String,
    },

    /// Condition could not be attached
    #[error("invalid condition on '{key}': {reason}")]
    InvalidCondition {
        /// Condition key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// Pass-role grant is not narrowly scoped
    #[error("invalid pass-role grant: {reason}")]
    InvalidGrant {
        /// Why it was rejected
        reason: String,
    },

    /// Rendered name exceeds the platform limit
    #[error("name '{name}' exceeds {max} characters")]
    NameTooLong {
        /// Rendered name
        name: String,
        /// Limit in bytes
        max: usize,
    },

    /// Malformed action
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Action and resource belong to different services
    #[error("action '{action}' does not apply to {service} resources")]
    ServiceMismatch {
        /// The offending action
        action: String,
        /// Service of the resource it was paired with
        service: String,
    },

    /// Malformed resource name suffix
    #[error("invalid suffix '{value}': {reason}")]
    InvalidSuffix {
        /// The rejected input
        value: String,
        /// Which rule was broken
        reason: String,
    },

    /// Partition, region or account that cannot be pasted into an ARN
    #[error("invalid {field} '{value}': {reason}")]
    InvalidTarget {
        /// `partition`, `region` or `account`
        field: &'static str,
        /// The rejected input
        value: String,
        /// Which rule was broken
        reason: String,
    },
}

impl ModelError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing dependency error
    pub fn missing_dependency(required: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingDependency {
            required: required.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid condition error
    pub fn invalid_condition(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCondition {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid grant error
    pub fn invalid_grant(reason: impl Into<String>) -> Self {
        Self::InvalidGrant {
            reason: reason.into(),
        }
    }

    /// Create an invalid target error
    pub fn invalid_target(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTarget {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Check if error was caused by the project identifier
    #[inline]
    #[must_use]
    pub fn is_identifier_error(&self) -> bool {
        matches!(self, Self::InvalidIdentifier { .. })
    }

    /// Check if error is retryable
    ///
    /// Always `false`: the model is a pure function of its input.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Result alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_value_and_reason() {
        let err = ModelError::invalid_identifier("Foo", "uppercase character 'F'");
        assert_eq!(
            err.to_string(),
            "invalid project identifier 'Foo': uppercase character 'F'"
        );
        assert!(err.is_identifier_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_dependency_is_not_identifier_error() {
        let err = ModelError::missing_dependency("orchestrator role", "not supplied");
        assert!(!err.is_identifier_error());
        assert!(err.to_string().contains("orchestrator role"));
    }

    #[test]
    fn invalid_target_names_field() {
        let err = ModelError::invalid_target("region", "*", "expected a region code");
        assert_eq!(err.to_string(), "invalid region '*': expected a region code");
        assert!(!err.is_identifier_error());
    }
}
