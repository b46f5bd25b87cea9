//! Permission statements

use serde::Serialize;
use serde_json::{json, Value};

use crate::action::Action;
use crate::condition::Conditions;
use crate::error::{ModelError, Result};
use crate::ident::ProjectIdentifier;
use crate::pattern::{RenderContext, ResourcePattern};

/// One scoped `Allow` grant
///
/// Immutable once built; narrowing produces a new statement.
///
/// # Invariants
/// - at least one action and one resource pattern;
/// - every action's service owns every resource pattern;
/// - an unscoped `*` resource only appears when every action is read-only;
/// - every scoped resource belongs to the same project.
///
/// Serialize only: [`PermissionStatement::new`] is the one way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PermissionStatement {
    sid: Option<String>,
    actions: Vec<Action>,
    resources: Vec<ResourcePattern>,
    #[serde(skip_serializing_if = "Conditions::is_empty")]
    conditions: Conditions,
}

impl PermissionStatement {
    /// Build and validate a statement
    ///
    /// Duplicate actions and resources are dropped; first-seen order is kept.
    ///
    /// # Errors
    /// [`ModelError::EmptyStatement`], [`ModelError::ServiceMismatch`],
    /// [`ModelError::UnscopedWildcard`], or [`ModelError::InvalidGrant`]
    /// when resources span projects.
    pub fn new(
        actions: impl IntoIterator<Item = Action>,
        resources: impl IntoIterator<Item = ResourcePattern>,
    ) -> Result<Self> {
        let actions = dedup(actions);
        let resources = dedup(resources);
        if actions.is_empty() || resources.is_empty() {
            return Err(ModelError::EmptyStatement);
        }

        for resource in &resources {
            let service = resource.kind().service();
            if let Some(action) = actions.iter().find(|a| a.service() != service) {
                return Err(ModelError::ServiceMismatch {
                    action: action.to_string(),
                    service: service.to_string(),
                });
            }
            if resource.is_unscoped() {
                if let Some(action) = actions.iter().find(|a| !a.is_read_only()) {
                    return Err(ModelError::UnscopedWildcard {
                        action: action.to_string(),
                    });
                }
            }
        }

        let mut projects = resources.iter().filter_map(ResourcePattern::project);
        if let Some(first) = projects.next() {
            if let Some(other) = projects.find(|p| *p != first) {
                return Err(ModelError::invalid_grant(format!(
                    "statement spans projects '{first}' and '{other}'"
                )));
            }
        }

        Ok(Self {
            sid: None,
            actions,
            resources,
            conditions: Conditions::new(),
        })
    }

    /// With statement id
    ///
    /// # Errors
    /// [`ModelError::InvalidAction`] if `sid` is not alphanumeric.
    pub fn with_sid(mut self, sid: impl Into<String>) -> Result<Self> {
        let sid = sid.into();
        if sid.is_empty() || !sid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ModelError::InvalidAction(format!(
                "statement id '{sid}' must be alphanumeric"
            )));
        }
        self.sid = Some(sid);
        Ok(self)
    }

    /// Same grant under a different condition set
    ///
    /// Narrowing logic lives with the caller; this only swaps the set.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Statement id
    #[inline]
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    /// Granted actions, in declaration order
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Resource patterns, in declaration order
    #[inline]
    #[must_use]
    pub fn resources(&self) -> &[ResourcePattern] {
        &self.resources
    }

    /// Conditions (possibly empty)
    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// Project the scoped resources belong to
    #[must_use]
    pub fn project(&self) -> Option<&ProjectIdentifier> {
        self.resources.iter().find_map(ResourcePattern::project)
    }

    /// Whether this is the read-only cross-project exception
    #[must_use]
    pub fn is_unscoped_read_only(&self) -> bool {
        self.resources.iter().any(ResourcePattern::is_unscoped)
            && self.actions.iter().all(Action::is_read_only)
    }

    /// Whether the statement grants `action`
    #[must_use]
    pub fn grants(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a.to_string() == action)
    }

    /// Rendered resource strings
    #[must_use]
    pub fn rendered_resources(&self, ctx: &RenderContext) -> Vec<String> {
        self.resources.iter().map(|r| r.render(ctx)).collect()
    }

    /// Render as a policy document statement
    #[must_use]
    pub fn render(&self, ctx: &RenderContext) -> Value {
        let mut out = serde_json::Map::new();
        if let Some(sid) = &self.sid {
            out.insert("Sid".into(), json!(sid));
        }
        out.insert("Effect".into(), json!("Allow"));
        out.insert(
            "Action".into(),
            one_or_many(self.actions.iter().map(ToString::to_string).collect()),
        );
        out.insert("Resource".into(), one_or_many(self.rendered_resources(ctx)));
        if !self.conditions.is_empty() {
            out.insert("Condition".into(), self.conditions.render(ctx));
        }
        Value::Object(out)
    }
}

fn dedup<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn one_or_many(mut values: Vec<String>) -> Value {
    if values.len() == 1 {
        Value::String(values.remove(0))
    } else {
        Value::Array(values.into_iter().map(Value::String).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{actions, Service};
    use crate::ident::Suffix;
    use crate::pattern::{NamePrefix, ResourceKind};

    fn id(s: &str) -> ProjectIdentifier {
        ProjectIdentifier::parse(s).unwrap()
    }

    #[test]
    fn rejects_empty() {
        let res = PermissionStatement::new(Vec::new(), [ResourcePattern::unscoped(ResourceKind::Stack)]);
        assert_eq!(res.unwrap_err(), ModelError::EmptyStatement);
        let acts = actions(Service::CloudFormation, &["DescribeStacks"]).unwrap();
        assert_eq!(
            PermissionStatement::new(acts, Vec::new()).unwrap_err(),
            ModelError::EmptyStatement
        );
    }

    #[test]
    fn unscoped_only_for_read_only() {
        let ok = PermissionStatement::new(
            actions(Service::CloudFormation, &["DescribeStacks"]).unwrap(),
            [ResourcePattern::unscoped(ResourceKind::Stack)],
        )
        .unwrap();
        assert!(ok.is_unscoped_read_only());
        assert!(ok.project().is_none());

        let err = PermissionStatement::new(
            actions(Service::CloudFormation, &["DescribeStacks", "DeleteStack"]).unwrap(),
            [ResourcePattern::unscoped(ResourceKind::Stack)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModelError::UnscopedWildcard {
                action: "cloudformation:DeleteStack".into()
            }
        );
    }

    #[test]
    fn rejects_service_mismatch() {
        let err = PermissionStatement::new(
            actions(Service::Iam, &["CreateRole"]).unwrap(),
            [ResourcePattern::prefixed(ResourceKind::Project, NamePrefix::Build, &id("foo"))],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ServiceMismatch { .. }));
    }

    #[test]
    fn rejects_cross_project_statement() {
        let err = PermissionStatement::new(
            actions(Service::CodeBuild, &["CreateProject"]).unwrap(),
            [
                ResourcePattern::prefixed(ResourceKind::Project, NamePrefix::Build, &id("foo")),
                ResourcePattern::prefixed(ResourceKind::Project, NamePrefix::Build, &id("bar")),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidGrant { .. }));
    }

    #[test]
    fn deduplicates_and_renders() {
        let ctx = RenderContext::resolved("us-east-1", "111122223333").unwrap();
        let stmt = PermissionStatement::new(
            actions(Service::CloudFormation, &["CreateStack", "CreateStack"]).unwrap(),
            [
                ResourcePattern::owned(ResourceKind::Stack, &id("foo"), Suffix::cicd()),
                ResourcePattern::owned(ResourceKind::Stack, &id("foo"), Suffix::cicd()),
            ],
        )
        .unwrap()
        .with_sid("CreateStack")
        .unwrap();
        assert_eq!(stmt.actions().len(), 1);
        assert_eq!(stmt.resources().len(), 1);
        assert_eq!(
            stmt.render(&ctx),
            json!({
                "Sid": "CreateStack",
                "Effect": "Allow",
                "Action": "cloudformation:CreateStack",
                "Resource": "arn:aws:cloudformation:us-east-1:111122223333:stack/foo--cicd"
            })
        );
    }

    #[test]
    fn rejects_bad_sid() {
        let stmt = PermissionStatement::new(
            actions(Service::CloudFormation, &["DescribeStacks"]).unwrap(),
            [ResourcePattern::unscoped(ResourceKind::Stack)],
        )
        .unwrap();
        assert!(stmt.with_sid("not valid").is_err());
    }
}
