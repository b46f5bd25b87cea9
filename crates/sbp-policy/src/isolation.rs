//! Cross-project isolation check
//!
//! Renders every grant of a plan and tests it against names another project
//! would own. The whitelisted describe statement is skipped; any other match
//! is an overlap.

use serde::Serialize;

use sbp_model::{
    NamePrefix, ProjectIdentifier, RenderContext, ResourceKind, ResourceName, ResourcePattern,
    Suffix,
};

use crate::plan::BootstrapPlan;

/// Sample child suffixes used when generating candidate names
const SAMPLE_CHILD_SUFFIXES: [&str; 3] = ["main", "feature-x", "cicd"];

/// One grant that reaches a foreign resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    /// Role holding the grant
    pub role: String,
    /// Statement id, if any
    pub sid: Option<String>,
    /// Rendered resource pattern
    pub pattern: String,
    /// Rendered foreign resource
    pub resource: String,
    /// Project owning the foreign resource
    pub owner: ProjectIdentifier,
}

/// Result of an isolation check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IsolationReport {
    /// Offending pattern/name pairs
    pub overlaps: Vec<Overlap>,
    /// Number of names tested
    pub names_checked: usize,
}

impl IsolationReport {
    /// No overlaps found
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.overlaps.is_empty()
    }
}

/// Check `plan` against resource names owned by other projects
///
/// Names owned by the plan's own project are ignored.
#[must_use]
pub fn check_isolation(plan: &BootstrapPlan, other_names: &[ResourceName]) -> IsolationReport {
    let ctx = check_context();
    let foreign: Vec<&ResourceName> =
        other_names.iter().filter(|n| n.project() != plan.project()).collect();

    let mut report = IsolationReport {
        overlaps: Vec::new(),
        names_checked: foreign.len(),
    };

    for role in plan.roles() {
        let role_name = role.name();
        for statement in role.all_statements() {
            if statement.is_unscoped_read_only() {
                continue;
            }
            for pattern in statement.resources() {
                for name in &foreign {
                    if pattern.matches(name, &ctx) {
                        let overlap = Overlap {
                            role: role_name.clone(),
                            sid: statement.sid().map(str::to_string),
                            pattern: pattern.render(&ctx),
                            resource: name.render(&ctx),
                            owner: name.project().clone(),
                        };
                        tracing::warn!(
                            role = %overlap.role,
                            pattern = %overlap.pattern,
                            resource = %overlap.resource,
                            owner = %overlap.owner,
                            "grant reaches another project's resource"
                        );
                        report.overlaps.push(overlap);
                    }
                }
            }
        }
    }

    tracing::debug!(
        project = %plan.project(),
        names = report.names_checked,
        overlaps = report.overlaps.len(),
        "isolation check finished"
    );
    report
}

/// Check two plans against each other's candidate names
#[must_use]
pub fn check_projects(a: &BootstrapPlan, b: &BootstrapPlan) -> IsolationReport {
    let forward = check_isolation(a, &candidate_names(b.project()));
    let backward = check_isolation(b, &candidate_names(a.project()));
    IsolationReport {
        names_checked: forward.names_checked + backward.names_checked,
        overlaps: forward.overlaps.into_iter().chain(backward.overlaps).collect(),
    }
}

/// Names `project` would own across every kind the model grants on
///
/// Covers the bootstrap names and everything derived from the project's
/// child builds (see [`child_names`]).
#[must_use]
pub fn candidate_names(project: &ProjectIdentifier) -> Vec<ResourceName> {
    let mut names = child_names(project);
    let cicd = Suffix::cicd();

    names.push(ResourceName::owned(ResourceKind::BootstrapRole, project, &cicd));
    names.push(ResourceName::owned(ResourceKind::BootstrapRole, project, &Suffix::cicd_deployment()));
    names.push(ResourceName::owned(ResourceKind::Stack, project, &cicd));
    names.push(ResourceName::owned_with_tail(ResourceKind::Stack, project, &cicd, "/0f3c9a2e"));
    names.push(ResourceName::owned(ResourceKind::LogGroup, project, &cicd));
    names.push(ResourceName::owned_with_tail(ResourceKind::LogGroup, project, &cicd, ":log-stream:run"));
    names.push(ResourceName::owned_with_tail(ResourceKind::ReportGroup, project, &cicd, "-unit"));
    names.push(ResourceName::owned(ResourceKind::Repository, project, &cicd));
    names.push(ResourceName::namespaced(ResourceKind::Parameter, project, "config/db"));
    if let Ok(secret) = Suffix::parse("dockerhub") {
        names.push(ResourceName::owned_with_tail(ResourceKind::Secret, project, &secret, "-a1B2c3"));
    }
    names
}

/// Names created for, or by, the child builds of `project`
///
/// Besides the build projects and roles themselves, CodeBuild names each
/// project's log group `/aws/codebuild/<project>` and its report groups
/// `<project>-<report>`.
#[must_use]
pub fn child_names(project: &ProjectIdentifier) -> Vec<ResourceName> {
    let mut names = Vec::new();
    for suffix in SAMPLE_CHILD_SUFFIXES.iter().filter_map(|s| Suffix::parse(s).ok()) {
        for prefix in NamePrefix::ALL {
            names.push(ResourceName::prefixed(ResourceKind::Project, prefix, project, &suffix));
            names.push(ResourceName::prefixed(ResourceKind::Role, prefix, project, &suffix));
            names.push(ResourceName::prefixed(ResourceKind::LogGroup, prefix, project, &suffix));
            names.push(ResourceName::prefixed_with_tail(
                ResourceKind::LogGroup,
                prefix,
                project,
                &suffix,
                ":log-stream:run",
            ));
            names.push(ResourceName::prefixed_with_tail(
                ResourceKind::ReportGroup,
                prefix,
                project,
                &suffix,
                "-unit",
            ));
        }
    }
    names
}

/// Region and account stay deferred; patterns and names render under the
/// same placeholders.
fn check_context() -> RenderContext {
    RenderContext::new()
}

/// Whether a single pattern reaches a name under the check context
///
/// Compared as rendered ARNs, so child and bootstrap roles share one space.
#[must_use]
pub fn pattern_reaches(pattern: &ResourcePattern, name: &ResourceName) -> bool {
    pattern.matches(name, &check_context())
}
