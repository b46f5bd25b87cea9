//! Orchestrator role
//!
//! The role the resource orchestration service assumes while it creates or
//! updates the project's CI/CD stack. It may manage the project's build and
//! pull-request build projects and provision the roles those builds run
//! under, all addressed through the `build-<id>--*` / `pr-<id>--*` prefixes.
//!
//! IAM cannot constrain the trust policy of a role this grant creates; the
//! provisioning collaborator runs [`crate::guard::RoleCreationGuard`] over
//! child templates to close that gap.

use sbp_model::{
    actions, NamePrefix, PermissionStatement, ProjectIdentifier, ResourceKind, ResourcePattern,
    RoleDescriptor, Service, Suffix, TrustedPrincipal,
};

use crate::error::Result;

/// Build-project and webhook management
pub const PROJECT_ACTIONS: [&str; 6] = [
    "CreateProject",
    "DeleteProject",
    "UpdateProject",
    "CreateWebhook",
    "DeleteWebhook",
    "UpdateWebhook",
];

/// Child build role provisioning
pub const ROLE_ACTIONS: [&str; 2] = ["CreateRole", "DeleteRole"];

/// Build the orchestrator role for a raw project identifier
///
/// The identifier is validated before any pattern is materialized.
///
/// # Errors
/// [`sbp_model::ModelError::InvalidIdentifier`] for malformed input.
///
/// # Example
/// ```
/// use sbp_policy::build_orchestrator_role;
///
/// let role = build_orchestrator_role("salesforce-apex-mocks").unwrap();
/// assert_eq!(role.name(), "salesforce-apex-mocks--cicd");
/// assert!(build_orchestrator_role("salesforce--apex").is_err());
/// ```
pub fn build_orchestrator_role(project_id: &str) -> Result<RoleDescriptor> {
    let project = ProjectIdentifier::parse(project_id)?;
    orchestrator_role(&project)
}

/// Build the orchestrator role for a validated identifier
///
/// # Errors
/// Only if a statement fails its own invariants, which the fixed action
/// lists here never do.
pub fn orchestrator_role(project: &ProjectIdentifier) -> Result<RoleDescriptor> {
    let projects = PermissionStatement::new(
        actions(Service::CodeBuild, &PROJECT_ACTIONS)?,
        child_patterns(ResourceKind::Project, project),
    )?
    .with_sid("ManageBuildProjects")?;

    let roles = PermissionStatement::new(
        actions(Service::Iam, &ROLE_ACTIONS)?,
        child_patterns(ResourceKind::Role, project),
    )?
    .with_sid("ManageBuildRoles")?;

    let role = RoleDescriptor::new(
        project.clone(),
        Suffix::cicd(),
        TrustedPrincipal::Orchestrator,
        vec![projects, roles],
        None,
    )?;

    tracing::debug!(
        project = %project,
        role = %role.name(),
        statements = role.statements().len(),
        "built orchestrator role"
    );
    Ok(role)
}

/// `build-<id>--*` and `pr-<id>--*` for one resource kind
fn child_patterns(kind: ResourceKind, project: &ProjectIdentifier) -> Vec<ResourcePattern> {
    NamePrefix::ALL
        .into_iter()
        .map(|prefix| ResourcePattern::prefixed(kind, prefix, project))
        .collect()
}
