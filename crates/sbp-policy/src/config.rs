//! Bootstrap configuration
//!
//! Loaded from TOML, YAML or JSON. Only the project identifier is required;
//! region and account stay deferred to stack pseudo-parameters when absent.
//! Partition, region and account are validated while parsing, so a `*` in a
//! config file fails to load.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use sbp_model::{AccountId, Partition, ProjectIdentifier, Region, RenderContext};

use crate::error::ConfigError;
use crate::extensions::Extension;

/// Inputs for one project's bootstrap plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Project identifier: lowercase segments joined by single hyphens
    #[schemars(with = "String")]
    pub project: ProjectIdentifier,

    /// ARN partition: `aws`, `aws-cn` or `aws-us-gov`
    #[serde(default)]
    #[schemars(with = "String")]
    pub partition: Partition,

    /// Region code; deferred to `${AWS::Region}` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub region: Option<Region>,

    /// Twelve-digit account id; deferred to `${AWS::AccountId}` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub account: Option<AccountId>,

    /// Optional executor grants
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

impl BootstrapConfig {
    /// Config for a project with defaults everywhere else
    #[must_use]
    pub fn new(project: ProjectIdentifier) -> Self {
        Self {
            project,
            partition: Partition::default(),
            region: None,
            account: None,
            extensions: Vec::new(),
        }
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// [`ConfigError::Toml`] on syntax errors, unknown fields, an invalid
    /// project identifier or a malformed partition, region or account.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse from YAML text
    ///
    /// # Errors
    /// [`ConfigError::Yaml`] on syntax or shape errors.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse from JSON text
    ///
    /// # Errors
    /// [`ConfigError::Json`] on syntax or shape errors.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a file, choosing the format by extension
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::UnsupportedFormat`] for an unknown extension, or the
    /// format's parse error.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let parse: fn(&str) -> Result<Self, ConfigError> = match ext.as_str() {
            "toml" => Self::from_toml_str,
            "yaml" | "yml" => Self::from_yaml_str,
            "json" => Self::from_json_str,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        let config = parse(&text)?;
        tracing::debug!(path = %path.display(), project = %config.project, "loaded config");
        Ok(config)
    }

    /// With region
    #[must_use]
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// With account
    #[must_use]
    pub fn with_account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    /// With partition
    #[must_use]
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    /// With an additional extension; duplicates are ignored
    #[must_use]
    pub fn with_extension(mut self, extension: Extension) -> Self {
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
        self
    }

    /// Render context for this config
    #[must_use]
    pub fn render_context(&self) -> RenderContext {
        let mut ctx = RenderContext::new().with_partition(self.partition);
        ctx.region.clone_from(&self.region);
        ctx.account.clone_from(&self.account);
        ctx
    }
}
