//! Child-role creation guard
//!
//! `iam:CreateRole` cannot be conditioned on the trust policy of the role
//! being created, so the orchestrator grant alone would let a child template
//! create a `build-<id>--*` role trusted by anyone. The provisioning
//! collaborator evaluates every child template with this guard first.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use serde_json::Value;

use sbp_model::{NamePrefix, ProjectIdentifier, TrustedPrincipal, BOOTSTRAP_ROLE_PATH};

use crate::error::Result;

const ROLE_TYPE: &str = "AWS::IAM::Role";

/// A child-template rule failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "kebab-case")]
pub enum GuardViolation {
    /// `RoleName` absent or not a literal string
    MissingRoleName {
        /// Template logical id
        logical_id: String,
    },
    /// `RoleName` outside the project's child prefixes
    NameOutOfScope {
        /// Template logical id
        logical_id: String,
        /// Offending name
        name: String,
    },
    /// Trust policy admits something other than the build service
    UntrustedPrincipal {
        /// Template logical id
        logical_id: String,
        /// Offending principal, as JSON
        principal: String,
    },
    /// Trust policy missing or not a policy document
    MalformedTrustPolicy {
        /// Template logical id
        logical_id: String,
        /// What is wrong
        reason: String,
    },
    /// Role placed under the bootstrap path
    ReservedPath {
        /// Template logical id
        logical_id: String,
        /// Offending path
        path: String,
    },
}

impl GuardViolation {
    /// Logical id of the offending resource
    #[must_use]
    pub fn logical_id(&self) -> &str {
        match self {
            Self::MissingRoleName { logical_id }
            | Self::NameOutOfScope { logical_id, .. }
            | Self::UntrustedPrincipal { logical_id, .. }
            | Self::MalformedTrustPolicy { logical_id, .. }
            | Self::ReservedPath { logical_id, .. } => logical_id,
        }
    }
}

impl Display for GuardViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoleName { logical_id } => {
                write!(f, "{logical_id}: RoleName must be a literal string")
            }
            Self::NameOutOfScope { logical_id, name } => {
                write!(f, "{logical_id}: role name '{name}' is outside the project prefixes")
            }
            Self::UntrustedPrincipal { logical_id, principal } => {
                write!(f, "{logical_id}: trust policy admits {principal}")
            }
            Self::MalformedTrustPolicy { logical_id, reason } => {
                write!(f, "{logical_id}: malformed trust policy: {reason}")
            }
            Self::ReservedPath { logical_id, path } => {
                write!(f, "{logical_id}: path '{path}' is reserved")
            }
        }
    }
}

/// Rules a child template's roles must satisfy for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCreationGuard {
    project: ProjectIdentifier,
    heads: Vec<String>,
}

impl RoleCreationGuard {
    /// Guard for a validated project
    #[must_use]
    pub fn new(project: ProjectIdentifier) -> Self {
        let heads = NamePrefix::ALL.iter().map(|p| p.name_head(&project)).collect();
        Self { project, heads }
    }

    /// Guard for a raw project identifier
    ///
    /// # Errors
    /// [`sbp_model::ModelError::InvalidIdentifier`] for malformed input.
    pub fn for_project(project_id: &str) -> Result<Self> {
        Ok(Self::new(ProjectIdentifier::parse(project_id)?))
    }

    /// Project
    #[must_use]
    pub fn project(&self) -> &ProjectIdentifier {
        &self.project
    }

    /// Evaluate every role resource of a template
    #[must_use]
    pub fn evaluate(&self, template: &Value) -> Vec<GuardViolation> {
        let Some(resources) = template.get("Resources").and_then(Value::as_object) else {
            return Vec::new();
        };

        let mut violations = Vec::new();
        for (logical_id, resource) in resources {
            if resource.get("Type").and_then(Value::as_str) != Some(ROLE_TYPE) {
                continue;
            }
            let props = resource.get("Properties").unwrap_or(&Value::Null);
            self.check_name(logical_id, props, &mut violations);
            check_path(logical_id, props, &mut violations);
            check_trust(logical_id, props, &mut violations);
        }

        for violation in &violations {
            tracing::warn!(project = %self.project, %violation, "child template violates role guard");
        }
        violations
    }

    fn check_name(&self, logical_id: &str, props: &Value, out: &mut Vec<GuardViolation>) {
        let Some(name) = props.get("RoleName").and_then(Value::as_str) else {
            out.push(GuardViolation::MissingRoleName {
                logical_id: logical_id.to_string(),
            });
            return;
        };
        let in_scope = self
            .heads
            .iter()
            .any(|head| name.len() > head.len() && name.starts_with(head.as_str()));
        if !in_scope {
            out.push(GuardViolation::NameOutOfScope {
                logical_id: logical_id.to_string(),
                name: name.to_string(),
            });
        }
    }

    /// The same rules in cloudformation-guard syntax
    #[must_use]
    pub fn render_rules(&self) -> String {
        let id = self.project.as_str();
        let service = TrustedPrincipal::BuildExecutor.service_name();
        let names = NamePrefix::ALL.map(NamePrefix::as_str).join("|");
        let reserved = BOOTSTRAP_ROLE_PATH.replace('/', "\\/");

        format!(
            "let child_roles = Resources.*[ Type == '{ROLE_TYPE}' ]\n\
             \n\
             rule {rule}_child_roles when %child_roles !empty {{\n\
             \x20   %child_roles.Properties.RoleName is_string\n\
             \x20   %child_roles.Properties.RoleName == /^({names})-{id}--.+$/\n\
             \x20   %child_roles.Properties.Path !exists or %child_roles.Properties.Path != /^{reserved}/\n\
             \x20   %child_roles.Properties.AssumeRolePolicyDocument.Statement[*].Principal.Service == '{service}'\n\
             \x20   %child_roles.Properties.AssumeRolePolicyDocument.Statement[*].Principal.AWS !exists\n\
             \x20   %child_roles.Properties.AssumeRolePolicyDocument.Statement[*].Principal.Federated !exists\n\
             }}\n",
            rule = id.replace('-', "_"),
        )
    }
}

fn check_path(logical_id: &str, props: &Value, out: &mut Vec<GuardViolation>) {
    match props.get("Path") {
        None => {}
        Some(Value::String(path)) if !path.starts_with(BOOTSTRAP_ROLE_PATH) => {}
        Some(other) => out.push(GuardViolation::ReservedPath {
            logical_id: logical_id.to_string(),
            path: other.as_str().map_or_else(|| other.to_string(), str::to_string),
        }),
    }
}

fn check_trust(logical_id: &str, props: &Value, out: &mut Vec<GuardViolation>) {
    let malformed = |reason: &str| GuardViolation::MalformedTrustPolicy {
        logical_id: logical_id.to_string(),
        reason: reason.to_string(),
    };

    let Some(doc) = props.get("AssumeRolePolicyDocument").and_then(Value::as_object) else {
        out.push(malformed("AssumeRolePolicyDocument missing"));
        return;
    };
    let statements: Vec<&Value> = match doc.get("Statement") {
        Some(Value::Array(items)) if !items.is_empty() => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => {
            out.push(malformed("Statement missing or empty"));
            return;
        }
    };

    for statement in statements {
        if statement.get("Effect").and_then(Value::as_str) == Some("Deny") {
            continue;
        }
        if statement.get("NotPrincipal").is_some() {
            out.push(malformed("NotPrincipal is not allowed"));
            continue;
        }
        match statement.get("Principal") {
            Some(principal) if trusts_only_build_service(principal) => {}
            Some(principal) => out.push(GuardViolation::UntrustedPrincipal {
                logical_id: logical_id.to_string(),
                principal: principal.to_string(),
            }),
            None => out.push(malformed("statement has no Principal")),
        }
    }
}

fn trusts_only_build_service(principal: &Value) -> bool {
    let service = TrustedPrincipal::BuildExecutor.service_name();
    let Some(map) = principal.as_object() else {
        return false;
    };
    if map.len() != 1 {
        return false;
    }
    match map.get("Service") {
        Some(Value::String(s)) => s == service,
        Some(Value::Array(items)) => {
            !items.is_empty() && items.iter().all(|v| v.as_str() == Some(service))
        }
        _ => false,
    }
}
