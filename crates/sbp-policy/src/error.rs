//! Error types for the permission model
//!
//! Provides error handling for:
//! - Descriptor construction (wrapped [`ModelError`])
//! - Configuration loading
//! - Document serialization

use std::path::PathBuf;

use sbp_model::ModelError;

/// Main policy error type
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Descriptor construction failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rendering a document failed
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl PolicyError {
    /// Underlying model error, if any
    #[must_use]
    pub fn model_error(&self) -> Option<&ModelError> {
        match self {
            Self::Model(e) => Some(e),
            _ => None,
        }
    }

    /// Check if the project identifier was rejected
    #[must_use]
    pub fn is_invalid_identifier(&self) -> bool {
        self.model_error().is_some_and(ModelError::is_identifier_error)
    }

    /// Check if a required descriptor was missing
    #[must_use]
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, Self::Model(ModelError::MissingDependency { .. }))
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for PolicyError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error while reading a config file
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML syntax or shape error
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension not recognised
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
