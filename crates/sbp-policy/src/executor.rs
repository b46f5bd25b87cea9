//! Build-executor role
//!
//! The role the build execution service assumes to deploy the project's
//! `<id>--cicd` stack. It may create or update that one stack, only while
//! handing it the orchestrator role, and it may pass the orchestrator role
//! only to the orchestration service acting on that stack. It gets no IAM
//! mutation of its own.

use std::collections::BTreeSet;

use sbp_model::{
    actions, ConditionKey, ConditionValue, ModelError, PassRoleGrant, PermissionStatement,
    ProjectIdentifier, ResourceKind, ResourcePattern, RoleDescriptor, Service, Suffix,
    TrustedPrincipal,
};

use crate::error::Result;
use crate::extensions::Extension;
use crate::scope::attach_conditional_scope;

/// Stack creation
pub const CREATE_ACTIONS: [&str; 1] = ["CreateStack"];

/// Stack updates through change sets
pub const UPDATE_ACTIONS: [&str; 3] = ["CreateChangeSet", "GetTemplate", "UpdateStack"];

/// The whitelisted read-only wildcard action
pub const DESCRIBE_ACTIONS: [&str; 1] = ["DescribeStacks"];

/// Build the executor role for a raw project identifier
///
/// # Errors
/// - [`ModelError::InvalidIdentifier`] for malformed input
/// - [`ModelError::MissingDependency`] when `orchestrator` is absent, is
///   not an orchestrator role, or belongs to another project
///
/// # Example
/// ```
/// use sbp_policy::{build_executor_role, build_orchestrator_role};
///
/// let orchestrator = build_orchestrator_role("foo").unwrap();
/// let executor = build_executor_role("foo", Some(&orchestrator)).unwrap();
/// assert_eq!(executor.name(), "foo--cicd-deployment");
///
/// let err = build_executor_role("foo", None).unwrap_err();
/// assert!(err.is_missing_dependency());
/// ```
pub fn build_executor_role(
    project_id: &str,
    orchestrator: Option<&RoleDescriptor>,
) -> Result<RoleDescriptor> {
    let project = ProjectIdentifier::parse(project_id)?;
    executor_role(&project, orchestrator)
}

/// Build the executor role for a validated identifier
///
/// # Errors
/// See [`build_executor_role`].
pub fn executor_role(
    project: &ProjectIdentifier,
    orchestrator: Option<&RoleDescriptor>,
) -> Result<RoleDescriptor> {
    executor_role_with(project, orchestrator, &[])
}

/// Build the executor role with optional extension statements appended
///
/// # Errors
/// See [`build_executor_role`].
pub fn executor_role_with(
    project: &ProjectIdentifier,
    orchestrator: Option<&RoleDescriptor>,
    extensions: &[Extension],
) -> Result<RoleDescriptor> {
    let orchestrator = require_orchestrator(project, orchestrator)?;

    let stack = ResourcePattern::owned(ResourceKind::Stack, project, Suffix::cicd());
    let stack_nested = ResourcePattern::owned_nested(ResourceKind::Stack, project, Suffix::cicd());
    let role_arn = BTreeSet::from([ConditionValue::Resource(orchestrator.arn_pattern())]);

    let create = PermissionStatement::new(
        actions(Service::CloudFormation, &CREATE_ACTIONS)?,
        [stack.clone(), stack_nested.clone()],
    )?
    .with_sid("CreateCicdStack")?;
    let create = attach_conditional_scope(create, ConditionKey::CloudFormationRoleArn, role_arn.clone())?;

    let update = PermissionStatement::new(
        actions(Service::CloudFormation, &UPDATE_ACTIONS)?,
        [stack.clone(), stack_nested],
    )?
    .with_sid("UpdateCicdStack")?;
    let update = attach_conditional_scope(update, ConditionKey::CloudFormationRoleArn, role_arn)?;

    let describe = PermissionStatement::new(
        actions(Service::CloudFormation, &DESCRIBE_ACTIONS)?,
        [ResourcePattern::unscoped(ResourceKind::Stack)],
    )?
    .with_sid("DescribeStacks")?;

    let pass_role = PassRoleGrant::new(orchestrator, TrustedPrincipal::Orchestrator, stack)?;

    let mut statements = vec![create, update, describe];
    for extension in extensions {
        statements.push(extension.statement(project)?);
    }

    let role = RoleDescriptor::new(
        project.clone(),
        Suffix::cicd_deployment(),
        TrustedPrincipal::BuildExecutor,
        statements,
        Some(pass_role),
    )?;

    tracing::debug!(
        project = %project,
        role = %role.name(),
        passes = %orchestrator.name(),
        extensions = extensions.len(),
        "built executor role"
    );
    Ok(role)
}

fn require_orchestrator<'a>(
    project: &ProjectIdentifier,
    orchestrator: Option<&'a RoleDescriptor>,
) -> Result<&'a RoleDescriptor> {
    const REQUIRED: &str = "orchestrator role";

    let role = orchestrator
        .ok_or_else(|| ModelError::missing_dependency(REQUIRED, "no orchestrator role supplied"))?;
    if role.trusted_principal() != TrustedPrincipal::Orchestrator {
        return Err(ModelError::missing_dependency(
            REQUIRED,
            format!("role '{}' is trusted by {}", role.name(), role.trusted_principal()),
        )
        .into());
    }
    if role.project() != project {
        return Err(ModelError::missing_dependency(
            REQUIRED,
            format!("role '{}' belongs to project '{}'", role.name(), role.project()),
        )
        .into());
    }
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::build_orchestrator_role;
    use sbp_model::{ConditionOperator, RenderContext};
    use serde_json::json;

    fn ctx() -> RenderContext {
        RenderContext::resolved("us-east-1", "111122223333").unwrap()
    }

    #[test]
    fn salesforce_scenario() {
        let id = "salesforce-apex-mocks";
        let orchestrator = build_orchestrator_role(id).unwrap();
        let executor = build_executor_role(id, Some(&orchestrator)).unwrap();

        assert_eq!(executor.trusted_principal(), TrustedPrincipal::BuildExecutor);
        assert_eq!(executor.name(), "salesforce-apex-mocks--cicd-deployment");

        let create = &executor.statements()[0];
        assert!(create.grants("cloudformation:CreateStack"));
        assert_eq!(
            create.rendered_resources(&ctx()),
            vec![
                "arn:aws:cloudformation:us-east-1:111122223333:stack/salesforce-apex-mocks--cicd",
                "arn:aws:cloudformation:us-east-1:111122223333:stack/salesforce-apex-mocks--cicd/*",
            ]
        );
        let role_arns = create
            .conditions()
            .get(ConditionOperator::StringEquals, &ConditionKey::CloudFormationRoleArn)
            .unwrap();
        assert_eq!(role_arns.len(), 1);

        let grant = executor.pass_role().unwrap();
        assert_eq!(grant.passed_to(), orchestrator.trusted_principal());
        assert_eq!(grant.role(), &orchestrator.arn_pattern());
        assert_eq!(
            grant.associated_resource().render(&ctx()),
            "arn:aws:cloudformation:us-east-1:111122223333:stack/salesforce-apex-mocks--cicd"
        );
    }

    #[test]
    fn no_iam_mutation_beyond_pass_role() {
        let orchestrator = build_orchestrator_role("foo").unwrap();
        let executor = build_executor_role("foo", Some(&orchestrator)).unwrap();
        let iam: Vec<String> = executor
            .all_statements()
            .flat_map(|s| s.actions())
            .filter(|a| a.service() == Service::Iam)
            .map(ToString::to_string)
            .collect();
        assert_eq!(iam, vec!["iam:PassRole"]);
    }

    #[test]
    fn only_describe_is_unscoped() {
        let orchestrator = build_orchestrator_role("foo").unwrap();
        let executor = build_executor_role("foo", Some(&orchestrator)).unwrap();
        let unscoped: Vec<_> = executor
            .all_statements()
            .filter(|s| s.resources().iter().any(ResourcePattern::is_unscoped))
            .collect();
        assert_eq!(unscoped.len(), 1);
        assert!(unscoped[0].is_unscoped_read_only());
        assert!(unscoped[0].grants("cloudformation:DescribeStacks"));
    }

    #[test]
    fn missing_orchestrator() {
        let err = build_executor_role("foo", None).unwrap_err();
        assert!(err.is_missing_dependency());
    }

    #[test]
    fn wrong_project_orchestrator() {
        let other = build_orchestrator_role("bar").unwrap();
        let err = build_executor_role("foo", Some(&other)).unwrap_err();
        assert!(err.is_missing_dependency());
    }

    #[test]
    fn executor_cannot_stand_in_for_orchestrator() {
        let orchestrator = build_orchestrator_role("foo").unwrap();
        let executor = build_executor_role("foo", Some(&orchestrator)).unwrap();
        let err = build_executor_role("foo", Some(&executor)).unwrap_err();
        assert!(err.is_missing_dependency());
    }

    #[test]
    fn identifier_checked_first() {
        let orchestrator = build_orchestrator_role("foo").unwrap();
        let err = build_executor_role("Foo", Some(&orchestrator)).unwrap_err();
        assert!(err.is_invalid_identifier());
    }

    #[test]
    fn pass_role_document() {
        let orchestrator = build_orchestrator_role("foo").unwrap();
        let executor = build_executor_role("foo", Some(&orchestrator)).unwrap();
        let doc = executor.policy_document(&ctx());
        let statements = doc["Statement"].as_array().unwrap();
        assert_eq!(
            statements.last().unwrap()["Condition"],
            json!({
                "StringEquals": {
                    "iam:AssociatedResourceArn": "arn:aws:cloudformation:us-east-1:111122223333:stack/foo--cicd",
                    "iam:PassedToService": "cloudformation.amazonaws.com"
                }
            })
        );
        assert_eq!(
            statements[0]["Condition"],
            json!({
                "StringEquals": {
                    "cloudformation:RoleArn": "arn:aws:iam::111122223333:role/bootstrap/foo--cicd"
                }
            })
        );
    }
}
