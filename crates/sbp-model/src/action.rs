//! Service prefixes and IAM actions

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// AWS service namespaces referenced by bootstrap grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    /// Build projects, webhooks and report groups
    CodeBuild,
    /// Roles
    Iam,
    /// Stacks
    CloudFormation,
    /// Build log groups
    Logs,
    /// Parameter store
    Ssm,
    /// Container image repositories
    Ecr,
    /// Registry credentials
    SecretsManager,
}

impl Service {
    /// All services, in prefix order
    pub const ALL: [Self; 7] = [
        Self::CloudFormation,
        Self::CodeBuild,
        Self::Ecr,
        Self::Iam,
        Self::Logs,
        Self::SecretsManager,
        Self::Ssm,
    ];

    /// IAM action / ARN service prefix
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::CodeBuild => "codebuild",
            Self::Iam => "iam",
            Self::CloudFormation => "cloudformation",
            Self::Logs => "logs",
            Self::Ssm => "ssm",
            Self::Ecr => "ecr",
            Self::SecretsManager => "secretsmanager",
        }
    }

    /// Look a service up by its prefix
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.prefix() == prefix)
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Single IAM action, `service:Name`
///
/// Names are PascalCase and may end in a single `*`
/// (as in `ssm:GetParameter*`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action {
    service: Service,
    name: String,
}

impl Action {
    /// Build an action from a service and an operation name
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidAction`] if the name is empty, does not
    /// start with an uppercase letter, or carries a wildcard anywhere but
    /// the end.
    pub fn new(service: Service, name: &str) -> Result<Self> {
        let body = name.strip_suffix('*').unwrap_or(name);
        let starts_upper = body.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if !starts_upper || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ModelError::InvalidAction(format!("{service}:{name}")));
        }
        Ok(Self {
            service,
            name: name.to_string(),
        })
    }

    /// Service namespace
    #[inline]
    #[must_use]
    pub fn service(&self) -> Service {
        self.service
    }

    /// Operation name without the service prefix
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the action ends in a wildcard
    #[inline]
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.name.ends_with('*')
    }

    /// Describe/List operations only
    ///
    /// These are the only actions allowed against an unscoped resource.
    /// Wildcard names are never read-only: `DescribeX*` could expand to
    /// something added later.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        !self.is_wildcard() && (self.name.starts_with("Describe") || self.name.starts_with("List"))
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.name)
    }
}

impl FromStr for Action {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let (prefix, name) = s
            .split_once(':')
            .ok_or_else(|| ModelError::InvalidAction(s.to_string()))?;
        let service =
            Service::from_prefix(prefix).ok_or_else(|| ModelError::InvalidAction(s.to_string()))?;
        Self::new(service, name)
    }
}

impl TryFrom<String> for Action {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.to_string()
    }
}

/// Build a list of actions for one service
///
/// # Errors
/// Fails on the first malformed name.
pub fn actions(service: Service, names: &[&str]) -> Result<Vec<Action>> {
    names.iter().map(|n| Action::new(service, n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders() {
        let a: Action = "codebuild:CreateProject".parse().unwrap();
        assert_eq!(a.service(), Service::CodeBuild);
        assert_eq!(a.name(), "CreateProject");
        assert_eq!(a.to_string(), "codebuild:CreateProject");
    }

    #[test]
    fn trailing_wildcard_allowed() {
        let a = Action::new(Service::Ssm, "GetParameter*").unwrap();
        assert!(a.is_wildcard());
        assert!(!a.is_read_only());
    }

    #[test]
    fn rejects_malformed() {
        assert!("CreateProject".parse::<Action>().is_err());
        assert!("unknown:CreateProject".parse::<Action>().is_err());
        assert!(Action::new(Service::Iam, "*").is_err());
        assert!(Action::new(Service::Iam, "create").is_err());
        assert!(Action::new(Service::Iam, "Pass*Role").is_err());
    }

    #[test]
    fn read_only_classification() {
        let describe = Action::new(Service::CloudFormation, "DescribeStacks").unwrap();
        let list = Action::new(Service::Iam, "ListRoles").unwrap();
        let create = Action::new(Service::CloudFormation, "CreateStack").unwrap();
        let get = Action::new(Service::SecretsManager, "GetSecretValue").unwrap();
        assert!(describe.is_read_only());
        assert!(list.is_read_only());
        assert!(!create.is_read_only());
        assert!(!get.is_read_only());
    }
}
