//! Role descriptors and the pass-role trust edge

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Value};

use crate::action::{Action, Service};
use crate::condition::{ConditionKey, ConditionOperator, ConditionValue, Conditions};
use crate::error::{ModelError, Result};
use crate::ident::{ProjectIdentifier, Suffix};
use crate::pattern::{NameScope, RenderContext, ResourceKind, ResourcePattern, BOOTSTRAP_ROLE_PATH};
use crate::principal::TrustedPrincipal;
use crate::statement::PermissionStatement;

/// IAM role name limit
pub const MAX_ROLE_NAME_LEN: usize = 64;

/// Policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Permission for one role to hand another role to a service
///
/// Always conditioned on exactly one service principal and exactly one
/// resource ARN, so it cannot be replayed against another service or
/// another stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PassRoleGrant {
    role: ResourcePattern,
    passed_to: TrustedPrincipal,
    associated_resource: ResourcePattern,
    statement: PermissionStatement,
}

impl PassRoleGrant {
    /// Grant passing `passed_role` to its own trusted service, for one resource
    ///
    /// # Errors
    /// [`ModelError::InvalidGrant`] when `passed_to` is not the role's trusted
    /// principal or the resource is wildcarded or out of project.
    pub fn new(
        passed_role: &RoleDescriptor,
        passed_to: TrustedPrincipal,
        associated_resource: ResourcePattern,
    ) -> Result<Self> {
        Self::from_condition_values(
            passed_role,
            &BTreeSet::from([ConditionValue::Service(passed_to)]),
            &BTreeSet::from([ConditionValue::Resource(associated_resource)]),
        )
    }

    /// Build from raw condition value sets
    ///
    /// # Errors
    /// [`ModelError::InvalidGrant`] unless each set holds exactly one
    /// non-wildcard value of the right type.
    pub fn from_condition_values(
        passed_role: &RoleDescriptor,
        services: &BTreeSet<ConditionValue>,
        resources: &BTreeSet<ConditionValue>,
    ) -> Result<Self> {
        let passed_to = match exactly_one(services, "service principal")? {
            ConditionValue::Service(p) => *p,
            ConditionValue::Literal(s) => TrustedPrincipal::from_service_name(s)
                .ok_or_else(|| ModelError::invalid_grant(format!("unknown service principal '{s}'")))?,
            ConditionValue::Resource(_) => {
                return Err(ModelError::invalid_grant("service condition holds a resource"))
            }
        };
        let associated_resource = match exactly_one(resources, "resource ARN")? {
            ConditionValue::Resource(p) => p.clone(),
            _ => return Err(ModelError::invalid_grant("resource condition must be a resource pattern")),
        };

        if passed_to != passed_role.trusted_principal() {
            return Err(ModelError::invalid_grant(format!(
                "role '{}' is trusted by {}, not {}",
                passed_role.name(),
                passed_role.trusted_principal(),
                passed_to
            )));
        }
        if associated_resource.contains_wildcard() {
            return Err(ModelError::invalid_grant(
                "associated resource must name exactly one resource",
            ));
        }
        if associated_resource.project() != Some(passed_role.project()) {
            return Err(ModelError::invalid_grant(format!(
                "associated resource is outside project '{}'",
                passed_role.project()
            )));
        }

        let role = passed_role.arn_pattern();
        let conditions = Conditions::new()
            .with(
                ConditionOperator::StringEquals,
                ConditionKey::PassedToService,
                BTreeSet::from([ConditionValue::Service(passed_to)]),
            )?
            .with(
                ConditionOperator::StringEquals,
                ConditionKey::AssociatedResourceArn,
                BTreeSet::from([ConditionValue::Resource(associated_resource.clone())]),
            )?;
        let statement =
            PermissionStatement::new([Action::new(Service::Iam, "PassRole")?], [role.clone()])?
                .with_sid(format!("Pass{}Role", passed_role.trusted_principal().role_label()))?
                .with_conditions(conditions);

        Ok(Self {
            role,
            passed_to,
            associated_resource,
            statement,
        })
    }

    /// Pattern of the role being passed
    #[inline]
    #[must_use]
    pub fn role(&self) -> &ResourcePattern {
        &self.role
    }

    /// Service the role may be passed to
    #[inline]
    #[must_use]
    pub fn passed_to(&self) -> TrustedPrincipal {
        self.passed_to
    }

    /// The one resource the passed role may act on
    #[inline]
    #[must_use]
    pub fn associated_resource(&self) -> &ResourcePattern {
        &self.associated_resource
    }

    /// `iam:PassRole` statement carrying both conditions
    #[inline]
    #[must_use]
    pub fn statement(&self) -> &PermissionStatement {
        &self.statement
    }
}

fn exactly_one<'a>(values: &'a BTreeSet<ConditionValue>, what: &str) -> Result<&'a ConditionValue> {
    let mut iter = values.iter();
    match (iter.next(), iter.next()) {
        (Some(v), None) if !v.is_wildcard() => Ok(v),
        (Some(_), None) => Err(ModelError::invalid_grant(format!("{what} must not be a wildcard"))),
        (None, _) => Err(ModelError::invalid_grant(format!("exactly one {what} required, got none"))),
        (Some(_), Some(_)) => Err(ModelError::invalid_grant(format!(
            "exactly one {what} required, got {}",
            values.len()
        ))),
    }
}

/// Named principal with one trust relationship and its own statements
///
/// Immutable after construction. Statements are owned exclusively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoleDescriptor {
    project: ProjectIdentifier,
    suffix: Suffix,
    trusted_principal: TrustedPrincipal,
    statements: Vec<PermissionStatement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pass_role: Option<PassRoleGrant>,
}

impl RoleDescriptor {
    /// Build and validate a role
    ///
    /// # Errors
    /// [`ModelError::NameTooLong`] if `<id>--<suffix>` exceeds the IAM
    /// limit, [`ModelError::InvalidGrant`] if any statement or the pass-role
    /// grant is scoped to another project.
    pub fn new(
        project: ProjectIdentifier,
        suffix: Suffix,
        trusted_principal: TrustedPrincipal,
        statements: Vec<PermissionStatement>,
        pass_role: Option<PassRoleGrant>,
    ) -> Result<Self> {
        let name = project.owned_name(&suffix);
        if name.len() > MAX_ROLE_NAME_LEN {
            return Err(ModelError::NameTooLong {
                name,
                max: MAX_ROLE_NAME_LEN,
            });
        }

        let foreign = statements
            .iter()
            .chain(pass_role.iter().map(PassRoleGrant::statement))
            .filter_map(PermissionStatement::project)
            .find(|p| *p != &project);
        if let Some(other) = foreign {
            return Err(ModelError::invalid_grant(format!(
                "role '{name}' carries a statement scoped to '{other}'"
            )));
        }

        Ok(Self {
            project,
            suffix,
            trusted_principal,
            statements,
            pass_role,
        })
    }

    /// `<id>--<suffix>`
    #[must_use]
    pub fn name(&self) -> String {
        self.project.owned_name(&self.suffix)
    }

    /// IAM path
    #[must_use]
    pub fn path(&self) -> &'static str {
        BOOTSTRAP_ROLE_PATH
    }

    /// Owning project
    #[inline]
    #[must_use]
    pub fn project(&self) -> &ProjectIdentifier {
        &self.project
    }

    /// Name suffix
    #[inline]
    #[must_use]
    pub fn suffix(&self) -> &Suffix {
        &self.suffix
    }

    /// Service named in the trust policy
    #[inline]
    #[must_use]
    pub fn trusted_principal(&self) -> TrustedPrincipal {
        self.trusted_principal
    }

    /// Own statements, excluding the pass-role statement
    #[inline]
    #[must_use]
    pub fn statements(&self) -> &[PermissionStatement] {
        &self.statements
    }

    /// Pass-role grant, if any
    #[inline]
    #[must_use]
    pub fn pass_role(&self) -> Option<&PassRoleGrant> {
        self.pass_role.as_ref()
    }

    /// Statements followed by the pass-role statement
    pub fn all_statements(&self) -> impl Iterator<Item = &PermissionStatement> {
        self.statements
            .iter()
            .chain(self.pass_role.iter().map(PassRoleGrant::statement))
    }

    /// Pattern addressing exactly this role
    #[must_use]
    pub fn arn_pattern(&self) -> ResourcePattern {
        ResourcePattern::new(
            ResourceKind::BootstrapRole,
            NameScope::Owned {
                project: self.project.clone(),
                suffix: self.suffix.clone(),
            },
        )
    }

    /// `AssumeRolePolicyDocument`
    #[must_use]
    pub fn trust_policy(&self) -> Value {
        json!({
            "Version": POLICY_VERSION,
            "Statement": [{
                "Effect": "Allow",
                "Principal": { "Service": self.trusted_principal.service_name() },
                "Action": "sts:AssumeRole"
            }]
        })
    }

    /// Inline permission policy document
    #[must_use]
    pub fn policy_document(&self, ctx: &RenderContext) -> Value {
        let statements: Vec<Value> = self.all_statements().map(|s| s.render(ctx)).collect();
        json!({
            "Version": POLICY_VERSION,
            "Statement": statements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::actions;
    use crate::pattern::NamePrefix;

    fn id(s: &str) -> ProjectIdentifier {
        ProjectIdentifier::parse(s).unwrap()
    }

    fn orchestrator(project: &ProjectIdentifier) -> RoleDescriptor {
        RoleDescriptor::new(
            project.clone(),
            Suffix::cicd(),
            TrustedPrincipal::Orchestrator,
            Vec::new(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn rejects_long_names() {
        let project = id(&"a".repeat(47));
        let long_suffix = Suffix::parse(&"b".repeat(20)).unwrap();
        let err = RoleDescriptor::new(project, long_suffix, TrustedPrincipal::BuildExecutor, Vec::new(), None)
            .unwrap_err();
        assert!(matches!(err, ModelError::NameTooLong { max: 64, .. }));
    }

    #[test]
    fn rejects_foreign_statement() {
        let stmt = PermissionStatement::new(
            actions(Service::CodeBuild, &["CreateProject"]).unwrap(),
            [ResourcePattern::prefixed(ResourceKind::Project, NamePrefix::Build, &id("bar"))],
        )
        .unwrap();
        let err = RoleDescriptor::new(id("foo"), Suffix::cicd(), TrustedPrincipal::Orchestrator, vec![stmt], None)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidGrant { .. }));
    }

    #[test]
    fn pass_role_requires_matching_principal() {
        let foo = id("foo");
        let role = orchestrator(&foo);
        let stack = ResourcePattern::owned(ResourceKind::Stack, &foo, Suffix::cicd());
        assert!(PassRoleGrant::new(&role, TrustedPrincipal::Orchestrator, stack.clone()).is_ok());
        let err = PassRoleGrant::new(&role, TrustedPrincipal::BuildExecutor, stack).unwrap_err();
        assert!(matches!(err, ModelError::InvalidGrant { .. }));
    }

    #[test]
    fn pass_role_rejects_wildcards_and_multiples() {
        let foo = id("foo");
        let role = orchestrator(&foo);
        let service = BTreeSet::from([ConditionValue::Service(TrustedPrincipal::Orchestrator)]);
        let stack = ConditionValue::Resource(ResourcePattern::owned(ResourceKind::Stack, &foo, Suffix::cicd()));

        let empty = PassRoleGrant::from_condition_values(&role, &service, &BTreeSet::new());
        assert!(empty.is_err());

        let wild = BTreeSet::from([ConditionValue::Resource(ResourcePattern::owned_nested(
            ResourceKind::Stack,
            &foo,
            Suffix::cicd(),
        ))]);
        assert!(PassRoleGrant::from_condition_values(&role, &service, &wild).is_err());

        let star = BTreeSet::from([ConditionValue::Literal("*".into())]);
        assert!(PassRoleGrant::from_condition_values(&role, &star, &BTreeSet::from([stack.clone()])).is_err());

        let two = BTreeSet::from([
            ConditionValue::Service(TrustedPrincipal::Orchestrator),
            ConditionValue::Service(TrustedPrincipal::BuildExecutor),
        ]);
        assert!(PassRoleGrant::from_condition_values(&role, &two, &BTreeSet::from([stack])).is_err());
    }

    #[test]
    fn pass_role_rejects_other_project_resource() {
        let role = orchestrator(&id("foo"));
        let other = ResourcePattern::owned(ResourceKind::Stack, &id("bar"), Suffix::cicd());
        assert!(PassRoleGrant::new(&role, TrustedPrincipal::Orchestrator, other).is_err());
    }

    #[test]
    fn pass_role_sid_names_the_passed_role() {
        let foo = id("foo");
        let executor = RoleDescriptor::new(
            foo.clone(),
            Suffix::cicd_deployment(),
            TrustedPrincipal::BuildExecutor,
            Vec::new(),
            None,
        )
        .unwrap();
        let project = ResourcePattern::owned(ResourceKind::Project, &foo, Suffix::cicd());
        let grant = PassRoleGrant::new(&executor, TrustedPrincipal::BuildExecutor, project).unwrap();
        assert_eq!(grant.statement().sid(), Some("PassBuildExecutorRole"));
    }

    /// `Check::<T>::DESERIALIZABLE` picks the inherent const only when `T`
    /// implements `DeserializeOwned`
    #[allow(dead_code)]
    struct Check<T>(std::marker::PhantomData<T>);

    trait NotDeserializable {
        const DESERIALIZABLE: bool = false;
    }

    impl<T> NotDeserializable for T {}

    impl<T: serde::de::DeserializeOwned> Check<T> {
        const DESERIALIZABLE: bool = true;
    }

    #[test]
    fn validated_descriptors_are_serialize_only() {
        assert!(!Check::<PermissionStatement>::DESERIALIZABLE);
        assert!(!Check::<PassRoleGrant>::DESERIALIZABLE);
        assert!(!Check::<RoleDescriptor>::DESERIALIZABLE);
        // validating newtypes keep their try_from round trip
        assert!(Check::<ProjectIdentifier>::DESERIALIZABLE);
    }

    #[test]
    fn pass_role_statement_shape() {
        let foo = id("foo");
        let role = orchestrator(&foo);
        let grant = PassRoleGrant::new(
            &role,
            TrustedPrincipal::Orchestrator,
            ResourcePattern::owned(ResourceKind::Stack, &foo, Suffix::cicd()),
        )
        .unwrap();
        let ctx = RenderContext::resolved("us-east-1", "111122223333").unwrap();
        assert_eq!(
            grant.statement().render(&ctx),
            json!({
                "Sid": "PassOrchestratorRole",
                "Effect": "Allow",
                "Action": "iam:PassRole",
                "Resource": "arn:aws:iam::111122223333:role/bootstrap/foo--cicd",
                "Condition": {
                    "StringEquals": {
                        "iam:AssociatedResourceArn": "arn:aws:cloudformation:us-east-1:111122223333:stack/foo--cicd",
                        "iam:PassedToService": "cloudformation.amazonaws.com"
                    }
                }
            })
        );
    }

    #[test]
    fn trust_policy_names_one_service() {
        let role = orchestrator(&id("foo"));
        assert_eq!(
            role.trust_policy()["Statement"][0]["Principal"]["Service"],
            json!("cloudformation.amazonaws.com")
        );
        assert_eq!(role.name(), "foo--cicd");
        assert_eq!(role.path(), "/bootstrap/");
    }
}
