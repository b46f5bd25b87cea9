//! Optional executor grants
//!
//! Build jobs commonly need a little more than stack deployment: writing
//! their own logs, publishing test reports, reading configuration, pulling
//! images, and authenticating to a private registry. Each extension renders
//! one statement and every one of them is project-scoped; none introduces a
//! new cross-project wildcard.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use sbp_model::{
    actions, PermissionStatement, ProjectIdentifier, ResourceKind, ResourcePattern, Service, Suffix,
};

use crate::error::Result;

/// Optional statement attached to the executor role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Extension {
    /// Deployment build log group `/aws/codebuild/<id>--cicd`
    BuildLogs,
    /// Report groups `<id>--cicd-*`
    TestReports,
    /// Parameters under `/<id>/`
    Parameters,
    /// Image pulls from repositories `<id>--*`
    ImagePull,
    /// Registry credential secret `<id>--<secret>`
    PrivateRegistry {
        /// Secret name tail after the project delimiter
        #[schemars(with = "String")]
        secret: Suffix,
    },
}

impl Extension {
    /// Short name used on the command line
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BuildLogs => "build-logs",
            Self::TestReports => "test-reports",
            Self::Parameters => "parameters",
            Self::ImagePull => "image-pull",
            Self::PrivateRegistry { .. } => "private-registry",
        }
    }

    /// Parse a command-line name; `private-registry` takes `=<secret>`
    ///
    /// # Errors
    /// [`sbp_model::ModelError::InvalidSuffix`] for a bad secret name,
    /// [`sbp_model::ModelError::InvalidAction`] for an unknown extension.
    pub fn parse_flag(flag: &str) -> Result<Self> {
        let (name, arg) = match flag.split_once('=') {
            Some((n, a)) => (n, Some(a)),
            None => (flag, None),
        };
        let ext = match (name, arg) {
            ("build-logs", None) => Self::BuildLogs,
            ("test-reports", None) => Self::TestReports,
            ("parameters", None) => Self::Parameters,
            ("image-pull", None) => Self::ImagePull,
            ("private-registry", Some(secret)) => Self::PrivateRegistry {
                secret: Suffix::parse(secret)?,
            },
            _ => {
                return Err(sbp_model::ModelError::InvalidAction(format!(
                    "unknown extension '{flag}'"
                ))
                .into())
            }
        };
        Ok(ext)
    }

    /// The statement this extension contributes
    ///
    /// # Errors
    /// Only on model invariant violations, which the fixed shapes here
    /// never trigger.
    pub fn statement(&self, project: &ProjectIdentifier) -> Result<PermissionStatement> {
        let statement = match self {
            Self::BuildLogs => PermissionStatement::new(
                actions(Service::Logs, &["CreateLogGroup", "CreateLogStream", "PutLogEvents"])?,
                [
                    ResourcePattern::owned(ResourceKind::LogGroup, project, Suffix::cicd()),
                    ResourcePattern::owned_nested(ResourceKind::LogGroup, project, Suffix::cicd()),
                ],
            )?
            .with_sid("WriteBuildLogs")?,
            Self::TestReports => PermissionStatement::new(
                actions(
                    Service::CodeBuild,
                    &["CreateReportGroup", "CreateReport", "UpdateReport", "BatchPutTestCases"],
                )?,
                [ResourcePattern::owned_family(ResourceKind::ReportGroup, project, Suffix::cicd())],
            )?
            .with_sid("PublishTestReports")?,
            Self::Parameters => PermissionStatement::new(
                actions(Service::Ssm, &["GetParameter*"])?,
                [ResourcePattern::namespace(ResourceKind::Parameter, project)],
            )?
            .with_sid("ReadParameters")?,
            Self::ImagePull => PermissionStatement::new(
                actions(
                    Service::Ecr,
                    &["BatchCheckLayerAvailability", "BatchGetImage", "GetDownloadUrlForLayer"],
                )?,
                [ResourcePattern::owned_any(ResourceKind::Repository, project)],
            )?
            .with_sid("PullImages")?,
            Self::PrivateRegistry { secret } => PermissionStatement::new(
                actions(Service::SecretsManager, &["GetSecretValue"])?,
                [ResourcePattern::owned_family(ResourceKind::Secret, project, secret.clone())],
            )?
            .with_sid("ReadRegistryCredential")?,
        };
        Ok(statement)
    }
}
