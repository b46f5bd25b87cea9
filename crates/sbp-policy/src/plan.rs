//! Bootstrap plan
//!
//! One project's orchestrator and executor roles, built in dependency order,
//! plus their rendering as a stack template and a stable fingerprint.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use serde_json::{json, Map, Value};

use sbp_model::{ModelError, ProjectIdentifier, RenderContext, RoleDescriptor};

use crate::config::BootstrapConfig;
use crate::error::Result;
use crate::executor::executor_role_with;
use crate::extensions::Extension;
use crate::orchestrator::orchestrator_role;

/// Template format version header
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Logical id of the orchestrator role resource
pub const ORCHESTRATOR_LOGICAL_ID: &str = "OrchestratorRole";

/// Logical id of the executor role resource
pub const EXECUTOR_LOGICAL_ID: &str = "ExecutorRole";

/// Both bootstrap roles for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapPlan {
    project: ProjectIdentifier,
    orchestrator: RoleDescriptor,
    executor: RoleDescriptor,
}

impl BootstrapPlan {
    /// Build both roles from a config
    ///
    /// # Errors
    /// Propagates any descriptor construction error.
    pub fn build(config: &BootstrapConfig) -> Result<Self> {
        BootstrapPlanBuilder::new(config.project.clone())
            .extensions(config.extensions.iter().cloned())
            .orchestrator()?
            .executor()?
            .finish()
    }

    /// Build with no extensions from a raw identifier
    ///
    /// # Errors
    /// [`ModelError::InvalidIdentifier`] for malformed input.
    pub fn for_project(project_id: &str) -> Result<Self> {
        let project = ProjectIdentifier::parse(project_id)?;
        Self::build(&BootstrapConfig::new(project))
    }

    /// Project
    #[inline]
    #[must_use]
    pub fn project(&self) -> &ProjectIdentifier {
        &self.project
    }

    /// Orchestrator role
    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &RoleDescriptor {
        &self.orchestrator
    }

    /// Executor role
    #[inline]
    #[must_use]
    pub fn executor(&self) -> &RoleDescriptor {
        &self.executor
    }

    /// Both roles, orchestrator first
    #[must_use]
    pub fn roles(&self) -> [&RoleDescriptor; 2] {
        [&self.orchestrator, &self.executor]
    }

    /// Render as a stack template
    ///
    /// Strings still holding pseudo-parameters are wrapped in `Fn::Sub`.
    #[must_use]
    pub fn to_template(&self, ctx: &RenderContext) -> Value {
        let mut resources = Map::new();
        resources.insert(ORCHESTRATOR_LOGICAL_ID.to_string(), role_resource(&self.orchestrator, ctx));
        resources.insert(EXECUTOR_LOGICAL_ID.to_string(), role_resource(&self.executor, ctx));

        let mut template = json!({
            "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
            "Description": format!("Bootstrap roles for project {}", self.project),
            "Resources": resources,
            "Outputs": {
                "OrchestratorRoleArn": {
                    "Value": { "Fn::GetAtt": [ORCHESTRATOR_LOGICAL_ID, "Arn"] }
                },
                "ExecutorRoleArn": {
                    "Value": { "Fn::GetAtt": [EXECUTOR_LOGICAL_ID, "Arn"] }
                }
            }
        });

        if ctx.has_placeholders() {
            wrap_substitutions(&mut template);
        }
        template
    }

    /// Template as pretty JSON
    ///
    /// # Errors
    /// [`crate::PolicyError::Serialization`] if encoding fails.
    pub fn to_json_string(&self, ctx: &RenderContext) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_template(ctx))?)
    }

    /// Template as YAML
    ///
    /// # Errors
    /// [`crate::PolicyError::Serialization`] if encoding fails.
    pub fn to_yaml_string(&self, ctx: &RenderContext) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_template(ctx))?)
    }

    /// Fingerprint of the rendered plan
    ///
    /// Computed under a fully deferred render context so that deployment
    /// targets do not change it.
    #[must_use]
    pub fn fingerprint(&self) -> PlanFingerprint {
        let template = self.to_template(&RenderContext::deferred());
        // Map keys are sorted, so the compact encoding is canonical.
        let bytes = template.to_string();
        PlanFingerprint::compute(bytes.as_bytes())
    }
}

fn role_resource(role: &RoleDescriptor, ctx: &RenderContext) -> Value {
    let name = role.name();
    json!({
        "Type": "AWS::IAM::Role",
        "Properties": {
            "RoleName": name,
            "Path": role.path(),
            "AssumeRolePolicyDocument": role.trust_policy(),
            "Policies": [{
                "PolicyName": format!("{name}-policy"),
                "PolicyDocument": role.policy_document(ctx),
            }]
        }
    })
}

fn wrap_substitutions(value: &mut Value) {
    match value {
        Value::String(s) if s.contains("${") => {
            *value = json!({ "Fn::Sub": s.as_str() });
        }
        Value::Array(items) => items.iter_mut().for_each(wrap_substitutions),
        Value::Object(map) => map.values_mut().for_each(wrap_substitutions),
        _ => {}
    }
}

/// Step-wise plan construction
///
/// The executor needs the orchestrator it will pass, so calling
/// [`BootstrapPlanBuilder::executor`] first fails with
/// [`ModelError::MissingDependency`].
#[derive(Debug, Clone)]
pub struct BootstrapPlanBuilder {
    project: ProjectIdentifier,
    extensions: Vec<Extension>,
    orchestrator: Option<RoleDescriptor>,
    executor: Option<RoleDescriptor>,
}

impl BootstrapPlanBuilder {
    /// Start a plan for `project`
    #[must_use]
    pub fn new(project: ProjectIdentifier) -> Self {
        Self {
            project,
            extensions: Vec::new(),
            orchestrator: None,
            executor: None,
        }
    }

    /// Executor extensions
    #[must_use]
    pub fn extensions(mut self, extensions: impl IntoIterator<Item = Extension>) -> Self {
        self.extensions.extend(extensions);
        self
    }

    /// Build the orchestrator role
    ///
    /// # Errors
    /// Propagates descriptor construction errors.
    pub fn orchestrator(mut self) -> Result<Self> {
        self.orchestrator = Some(orchestrator_role(&self.project)?);
        Ok(self)
    }

    /// Build the executor role against the orchestrator built earlier
    ///
    /// # Errors
    /// [`ModelError::MissingDependency`] if the orchestrator step has not run.
    pub fn executor(mut self) -> Result<Self> {
        self.executor = Some(executor_role_with(
            &self.project,
            self.orchestrator.as_ref(),
            &self.extensions,
        )?);
        Ok(self)
    }

    /// Finish the plan
    ///
    /// # Errors
    /// [`ModelError::MissingDependency`] if either step has not run.
    pub fn finish(self) -> Result<BootstrapPlan> {
        let orchestrator = self
            .orchestrator
            .ok_or_else(|| ModelError::missing_dependency("orchestrator role", "step not run"))?;
        let executor = self
            .executor
            .ok_or_else(|| ModelError::missing_dependency("executor role", "step not run"))?;
        Ok(BootstrapPlan {
            project: self.project,
            orchestrator,
            executor,
        })
    }
}

/// Blake3 digest of a rendered plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanFingerprint([u8; 32]);

impl PlanFingerprint {
    /// Hash arbitrary bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Raw digest
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 hex chars
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for PlanFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for PlanFingerprint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
