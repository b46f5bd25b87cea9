//! Structured resource patterns
//!
//! Grants are never assembled from interpolated ARN strings. A
//! [`ResourcePattern`] records *what* is addressed (resource kind, project,
//! name shape) and renders to ARN syntax only at the boundary, against a
//! [`RenderContext`] that either fixes region/account or leaves them as
//! placeholders for the provisioning collaborator to resolve.
//!
//! # Key invariants
//! - Every pattern except [`NameScope::Unscoped`] carries a
//!   [`ProjectIdentifier`], and the identifier is always followed by the
//!   `--` delimiter or `/`, neither of which can occur inside an identifier.
//! - Bootstrap roles live under their own IAM path, so no child-role
//!   pattern (`role/build-<id>--*`) can reach them.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::action::Service;
use crate::error::Result;
use crate::ident::{ProjectIdentifier, Suffix, DELIMITER};
use crate::target::{AccountId, Partition, Region};

/// IAM path of the two bootstrap roles
pub const BOOTSTRAP_ROLE_PATH: &str = "/bootstrap/";

/// Fixed name prefix of child resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamePrefix {
    /// Branch build jobs
    Build,
    /// Pull-request build jobs
    Pr,
}

impl NamePrefix {
    /// Both prefixes, in render order
    pub const ALL: [Self; 2] = [Self::Build, Self::Pr];

    /// Literal prefix text
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Pr => "pr",
        }
    }

    /// `<prefix>-<id>--`
    #[must_use]
    pub fn name_head(self, project: &ProjectIdentifier) -> String {
        format!("{}-{}{DELIMITER}", self.as_str(), project)
    }
}

impl Display for NamePrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource kinds addressed by bootstrap grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// CodeBuild project
    Project,
    /// CodeBuild report group
    ReportGroup,
    /// IAM role at the root path (child build roles)
    Role,
    /// IAM role under [`BOOTSTRAP_ROLE_PATH`]
    BootstrapRole,
    /// CloudFormation stack
    Stack,
    /// CloudWatch log group of a CodeBuild project
    LogGroup,
    /// SSM parameter
    Parameter,
    /// ECR repository
    Repository,
    /// Secrets Manager secret
    Secret,
}

impl ResourceKind {
    /// Owning service
    #[must_use]
    pub const fn service(self) -> Service {
        match self {
            Self::Project | Self::ReportGroup => Service::CodeBuild,
            Self::Role | Self::BootstrapRole => Service::Iam,
            Self::Stack => Service::CloudFormation,
            Self::LogGroup => Service::Logs,
            Self::Parameter => Service::Ssm,
            Self::Repository => Service::Ecr,
            Self::Secret => Service::SecretsManager,
        }
    }

    /// Resource-type token in the ARN
    #[must_use]
    pub const fn resource_type(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::ReportGroup => "report-group",
            Self::Role | Self::BootstrapRole => "role",
            Self::Stack => "stack",
            Self::LogGroup => "log-group",
            Self::Parameter => "parameter",
            Self::Repository => "repository",
            Self::Secret => "secret",
        }
    }

    /// Separator between resource type and name
    #[must_use]
    pub const fn type_separator(self) -> char {
        match self {
            Self::LogGroup | Self::Secret => ':',
            _ => '/',
        }
    }

    /// Fixed text between the separator and the project-scoped name
    #[must_use]
    pub const fn name_prefix(self) -> &'static str {
        match self {
            Self::BootstrapRole => "bootstrap/",
            Self::LogGroup => "/aws/codebuild/",
            _ => "",
        }
    }

    /// Tail that addresses sub-resources of a named resource
    #[must_use]
    pub const fn nested_tail(self) -> &'static str {
        match self {
            Self::LogGroup => ":*",
            _ => "/*",
        }
    }

    /// IAM ARNs carry no region
    #[must_use]
    pub const fn is_regional(self) -> bool {
        !matches!(self, Self::Role | Self::BootstrapRole)
    }
}

/// Shape of the name part of a pattern
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "kebab-case")]
pub enum NameScope {
    /// `<prefix>-<id>--*`
    Prefixed {
        /// Child prefix
        prefix: NamePrefix,
        /// Owning project
        project: ProjectIdentifier,
    },
    /// `<id>--<suffix>`
    Owned {
        /// Owning project
        project: ProjectIdentifier,
        /// Name tail
        suffix: Suffix,
    },
    /// `<id>--<suffix>` followed by the kind's nested tail
    OwnedNested {
        /// Owning project
        project: ProjectIdentifier,
        /// Name tail
        suffix: Suffix,
    },
    /// `<id>--*`
    OwnedAny {
        /// Owning project
        project: ProjectIdentifier,
    },
    /// `<id>--<suffix>-*`
    OwnedFamily {
        /// Owning project
        project: ProjectIdentifier,
        /// Name tail before the generated part
        suffix: Suffix,
    },
    /// `<id>/*`
    Namespace {
        /// Owning project
        project: ProjectIdentifier,
    },
    /// `*`, only legal for read-only actions
    Unscoped,
}

impl NameScope {
    /// Owning project, `None` for [`NameScope::Unscoped`]
    #[must_use]
    pub fn project(&self) -> Option<&ProjectIdentifier> {
        match self {
            Self::Prefixed { project, .. }
            | Self::Owned { project, .. }
            | Self::OwnedNested { project, .. }
            | Self::OwnedAny { project }
            | Self::OwnedFamily { project, .. }
            | Self::Namespace { project } => Some(project),
            Self::Unscoped => None,
        }
    }

    fn render_name(&self, kind: ResourceKind) -> String {
        match self {
            Self::Prefixed { prefix, project } => format!("{}*", prefix.name_head(project)),
            Self::Owned { project, suffix } => project.owned_name(suffix),
            Self::OwnedNested { project, suffix } => {
                format!("{}{}", project.owned_name(suffix), kind.nested_tail())
            }
            Self::OwnedAny { project } => format!("{project}{DELIMITER}*"),
            Self::OwnedFamily { project, suffix } => format!("{}-*", project.owned_name(suffix)),
            Self::Namespace { project } => format!("{project}/*"),
            Self::Unscoped => "*".to_string(),
        }
    }
}

/// Partition / region / account used when rendering ARNs
///
/// `None` renders as the matching CloudFormation pseudo-parameter
/// (`${AWS::Region}`, `${AWS::AccountId}`, `${AWS::Partition}`). Fixed
/// values are validated types, so no wildcard or ARN separator can be
/// pasted into a grant through the context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderContext {
    /// ARN partition
    pub partition: Option<Partition>,
    /// Region
    pub region: Option<Region>,
    /// Account id
    pub account: Option<AccountId>,
}

impl RenderContext {
    /// Partition pseudo-parameter
    pub const PARTITION_PLACEHOLDER: &'static str = "${AWS::Partition}";
    /// Region pseudo-parameter
    pub const REGION_PLACEHOLDER: &'static str = "${AWS::Region}";
    /// Account pseudo-parameter
    pub const ACCOUNT_PLACEHOLDER: &'static str = "${AWS::AccountId}";

    /// `aws` partition, region and account deferred
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything deferred, including the partition
    #[must_use]
    pub fn deferred() -> Self {
        Self {
            partition: None,
            region: None,
            account: None,
        }
    }

    /// `aws` partition with region and account fixed
    ///
    /// # Errors
    /// [`ModelError::InvalidTarget`](crate::ModelError::InvalidTarget) if
    /// either value is malformed.
    pub fn resolved(region: &str, account: &str) -> Result<Self> {
        Ok(Self::new()
            .with_region(Region::parse(region)?)
            .with_account(AccountId::parse(account)?))
    }

    /// With partition
    #[must_use]
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
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

    /// Whether rendered ARNs still contain pseudo-parameters
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.partition.is_none() || self.region.is_none() || self.account.is_none()
    }

    fn partition(&self) -> &str {
        self.partition.map_or(Self::PARTITION_PLACEHOLDER, Partition::as_str)
    }

    fn region(&self) -> &str {
        self.region.as_ref().map_or(Self::REGION_PLACEHOLDER, Region::as_str)
    }

    fn account(&self) -> &str {
        self.account.as_ref().map_or(Self::ACCOUNT_PLACEHOLDER, AccountId::as_str)
    }

    fn arn(&self, kind: ResourceKind, name: &str) -> String {
        let region = if kind.is_regional() { self.region() } else { "" };
        format!(
            "arn:{}:{}:{}:{}:{}{}{}{}",
            self.partition(),
            kind.service(),
            region,
            self.account(),
            kind.resource_type(),
            kind.type_separator(),
            kind.name_prefix(),
            name,
        )
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            partition: Some(Partition::Aws),
            region: None,
            account: None,
        }
    }
}

/// Typed resource-matching template
///
/// # Examples
/// ```
/// use sbp_model::{NamePrefix, ProjectIdentifier, RenderContext, ResourceKind, ResourcePattern};
///
/// let id = ProjectIdentifier::parse("foo").unwrap();
/// let pattern = ResourcePattern::prefixed(ResourceKind::Project, NamePrefix::Pr, &id);
/// let ctx = RenderContext::resolved("eu-west-1", "123456789012").unwrap();
/// assert_eq!(
///     pattern.render(&ctx),
///     "arn:aws:codebuild:eu-west-1:123456789012:project/pr-foo--*"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourcePattern {
    kind: ResourceKind,
    scope: NameScope,
}

impl ResourcePattern {
    /// Pattern from parts
    #[must_use]
    pub fn new(kind: ResourceKind, scope: NameScope) -> Self {
        Self { kind, scope }
    }

    /// `<prefix>-<id>--*`
    #[must_use]
    pub fn prefixed(kind: ResourceKind, prefix: NamePrefix, project: &ProjectIdentifier) -> Self {
        Self::new(
            kind,
            NameScope::Prefixed {
                prefix,
                project: project.clone(),
            },
        )
    }

    /// `<id>--<suffix>`
    #[must_use]
    pub fn owned(kind: ResourceKind, project: &ProjectIdentifier, suffix: Suffix) -> Self {
        Self::new(
            kind,
            NameScope::Owned {
                project: project.clone(),
                suffix,
            },
        )
    }

    /// `<id>--<suffix>` plus nested tail
    #[must_use]
    pub fn owned_nested(kind: ResourceKind, project: &ProjectIdentifier, suffix: Suffix) -> Self {
        Self::new(
            kind,
            NameScope::OwnedNested {
                project: project.clone(),
                suffix,
            },
        )
    }

    /// `<id>--*`
    #[must_use]
    pub fn owned_any(kind: ResourceKind, project: &ProjectIdentifier) -> Self {
        Self::new(
            kind,
            NameScope::OwnedAny {
                project: project.clone(),
            },
        )
    }

    /// `<id>--<suffix>-*`
    #[must_use]
    pub fn owned_family(kind: ResourceKind, project: &ProjectIdentifier, suffix: Suffix) -> Self {
        Self::new(
            kind,
            NameScope::OwnedFamily {
                project: project.clone(),
                suffix,
            },
        )
    }

    /// `<id>/*`
    #[must_use]
    pub fn namespace(kind: ResourceKind, project: &ProjectIdentifier) -> Self {
        Self::new(
            kind,
            NameScope::Namespace {
                project: project.clone(),
            },
        )
    }

    /// Bare `*`
    #[must_use]
    pub fn unscoped(kind: ResourceKind) -> Self {
        Self::new(kind, NameScope::Unscoped)
    }

    /// Resource kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Name scope
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &NameScope {
        &self.scope
    }

    /// Owning project
    #[inline]
    #[must_use]
    pub fn project(&self) -> Option<&ProjectIdentifier> {
        self.scope.project()
    }

    /// Whether this is the bare `*`
    #[inline]
    #[must_use]
    pub fn is_unscoped(&self) -> bool {
        matches!(self.scope, NameScope::Unscoped)
    }

    /// Whether the rendered form matches more than one name
    #[must_use]
    pub fn contains_wildcard(&self) -> bool {
        !matches!(self.scope, NameScope::Owned { .. })
    }

    /// Render to ARN pattern syntax
    #[must_use]
    pub fn render(&self, ctx: &RenderContext) -> String {
        if self.is_unscoped() {
            return "*".to_string();
        }
        ctx.arn(self.kind, &self.scope.render_name(self.kind))
    }

    /// Whether the pattern would authorize a concrete resource
    #[must_use]
    pub fn matches(&self, name: &ResourceName, ctx: &RenderContext) -> bool {
        wildcard_match(&self.render(ctx), &name.render(ctx))
    }
}

/// Concrete resource name owned by a project
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceName {
    kind: ResourceKind,
    project: ProjectIdentifier,
    name: String,
}

impl ResourceName {
    /// `<prefix>-<id>--<suffix>`
    #[must_use]
    pub fn prefixed(
        kind: ResourceKind,
        prefix: NamePrefix,
        project: &ProjectIdentifier,
        suffix: &Suffix,
    ) -> Self {
        Self {
            kind,
            project: project.clone(),
            name: format!("{}{}", prefix.name_head(project), suffix),
        }
    }

    /// `<prefix>-<id>--<suffix><tail>`, for names derived from a child
    /// project such as its report groups
    #[must_use]
    pub fn prefixed_with_tail(
        kind: ResourceKind,
        prefix: NamePrefix,
        project: &ProjectIdentifier,
        suffix: &Suffix,
        tail: &str,
    ) -> Self {
        let mut name = Self::prefixed(kind, prefix, project, suffix);
        name.name.push_str(tail);
        name
    }

    /// `<id>--<suffix>`
    #[must_use]
    pub fn owned(kind: ResourceKind, project: &ProjectIdentifier, suffix: &Suffix) -> Self {
        Self {
            kind,
            project: project.clone(),
            name: project.owned_name(suffix),
        }
    }

    /// `<id>--<suffix><tail>`; `tail` is literal (a nested path, a random
    /// secret tail)
    #[must_use]
    pub fn owned_with_tail(
        kind: ResourceKind,
        project: &ProjectIdentifier,
        suffix: &Suffix,
        tail: &str,
    ) -> Self {
        Self {
            kind,
            project: project.clone(),
            name: format!("{}{tail}", project.owned_name(suffix)),
        }
    }

    /// `<id>/<path>`
    #[must_use]
    pub fn namespaced(kind: ResourceKind, project: &ProjectIdentifier, path: &str) -> Self {
        Self {
            kind,
            project: project.clone(),
            name: format!("{project}/{path}"),
        }
    }

    /// Resource kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Owning project
    #[inline]
    #[must_use]
    pub fn project(&self) -> &ProjectIdentifier {
        &self.project
    }

    /// Name part, without ARN framing
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full ARN
    #[must_use]
    pub fn render(&self, ctx: &RenderContext) -> String {
        ctx.arn(self.kind, &self.name)
    }
}

/// Glob match where `*` matches any run of characters, including none
///
/// Greedy with single-star backtracking; linear-ish for the short patterns
/// IAM uses.
#[must_use]
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let p = pattern.as_bytes();
    let v = value.as_bytes();
    let (mut pi, mut vi) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while vi < v.len() {
        if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, vi));
            pi += 1;
        } else if pi < p.len() && p[pi] == v[vi] {
            pi += 1;
            vi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            vi = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&b| b == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ProjectIdentifier {
        ProjectIdentifier::parse(s).unwrap()
    }

    fn ctx() -> RenderContext {
        RenderContext::resolved("us-east-1", "111122223333").unwrap()
    }

    #[test]
    fn renders_prefixed_project_arn() {
        let p = ResourcePattern::prefixed(ResourceKind::Project, NamePrefix::Build, &id("foo"));
        assert_eq!(
            p.render(&ctx()),
            "arn:aws:codebuild:us-east-1:111122223333:project/build-foo--*"
        );
    }

    #[test]
    fn iam_arns_have_no_region() {
        let p = ResourcePattern::prefixed(ResourceKind::Role, NamePrefix::Pr, &id("foo"));
        assert_eq!(p.render(&ctx()), "arn:aws:iam::111122223333:role/pr-foo--*");

        let boot = ResourcePattern::owned(ResourceKind::BootstrapRole, &id("foo"), Suffix::cicd());
        assert_eq!(
            boot.render(&ctx()),
            "arn:aws:iam::111122223333:role/bootstrap/foo--cicd"
        );
    }

    #[test]
    fn nested_tails_follow_kind() {
        let stack = ResourcePattern::owned_nested(ResourceKind::Stack, &id("foo"), Suffix::cicd());
        assert_eq!(
            stack.render(&ctx()),
            "arn:aws:cloudformation:us-east-1:111122223333:stack/foo--cicd/*"
        );
        let logs = ResourcePattern::owned_nested(ResourceKind::LogGroup, &id("foo"), Suffix::cicd());
        assert_eq!(
            logs.render(&ctx()),
            "arn:aws:logs:us-east-1:111122223333:log-group:/aws/codebuild/foo--cicd:*"
        );
    }

    #[test]
    fn deferred_context_renders_placeholders() {
        let p = ResourcePattern::owned(ResourceKind::Stack, &id("foo"), Suffix::cicd());
        assert_eq!(
            p.render(&RenderContext::deferred()),
            "arn:${AWS::Partition}:cloudformation:${AWS::Region}:${AWS::AccountId}:stack/foo--cicd"
        );
        assert!(RenderContext::new().has_placeholders());
        assert!(!ctx().has_placeholders());
    }

    #[test]
    fn unscoped_renders_star() {
        let p = ResourcePattern::unscoped(ResourceKind::Stack);
        assert!(p.is_unscoped());
        assert!(p.project().is_none());
        assert_eq!(p.render(&ctx()), "*");
    }

    #[test]
    fn only_owned_is_wildcard_free() {
        let foo = id("foo");
        assert!(!ResourcePattern::owned(ResourceKind::Stack, &foo, Suffix::cicd()).contains_wildcard());
        assert!(ResourcePattern::owned_any(ResourceKind::Repository, &foo).contains_wildcard());
        assert!(ResourcePattern::namespace(ResourceKind::Parameter, &foo).contains_wildcard());
    }

    #[test]
    fn prefixed_pattern_does_not_reach_longer_project() {
        let suffix = Suffix::parse("unit").unwrap();
        let p = ResourcePattern::prefixed(ResourceKind::Project, NamePrefix::Build, &id("foo"));
        let own = ResourceName::prefixed(ResourceKind::Project, NamePrefix::Build, &id("foo"), &suffix);
        let other =
            ResourceName::prefixed(ResourceKind::Project, NamePrefix::Build, &id("foo-bar"), &suffix);
        assert!(p.matches(&own, &ctx()));
        assert!(!p.matches(&other, &ctx()));
    }

    #[test]
    fn child_role_pattern_never_reaches_bootstrap_path() {
        let p = ResourcePattern::prefixed(ResourceKind::Role, NamePrefix::Build, &id("x")).render(&ctx());
        assert!(!wildcard_match(&p, "arn:aws:iam::111122223333:role/bootstrap/build-x--cicd"));
        assert!(wildcard_match(&p, "arn:aws:iam::111122223333:role/build-x--cicd"));
    }

    #[test]
    fn other_partitions_render() {
        let p = ResourcePattern::owned(ResourceKind::Stack, &id("foo"), Suffix::cicd());
        let ctx = ctx().with_partition(Partition::AwsCn);
        assert_eq!(
            p.render(&ctx),
            "arn:aws-cn:cloudformation:us-east-1:111122223333:stack/foo--cicd"
        );
    }

    #[test]
    fn resolved_context_rejects_wildcards() {
        for (region, account) in [("*", "111122223333"), ("us-east-1", "*"), ("", ""), ("us:east-1", "111122223333")] {
            assert!(RenderContext::resolved(region, account).is_err(), "{region:?} / {account:?}");
        }
    }

    #[test]
    fn context_deserialization_revalidates() {
        let ok: RenderContext =
            serde_json::from_str(r#"{"partition":"aws","region":"eu-west-1","account":"111122223333"}"#).unwrap();
        assert!(!ok.has_placeholders());
        let bad = r#"{"partition":"aws","region":"*","account":"111122223333"}"#;
        assert!(serde_json::from_str::<RenderContext>(bad).is_err());
    }

    #[test]
    fn wildcard_match_basics() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("abc", "abc"));
        assert!(!wildcard_match("abc", "abcd"));
        assert!(wildcard_match("a*c", "abbbc"));
        assert!(wildcard_match("a*", "a"));
        assert!(wildcard_match("*b*", "abc"));
        assert!(!wildcard_match("a*d", "abc"));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("", "a"));
        assert!(wildcard_match("", ""));
    }
}
