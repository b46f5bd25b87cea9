//! SBP Policy
//!
//! The scoped bootstrap permission model: from one project identifier, the
//! orchestrator role and the build-executor role a self-service CI/CD
//! pipeline deploys under.
//!
//! # Core Concepts
//!
//! - [`build_orchestrator_role`]: manages `build-<id>--*` / `pr-<id>--*` projects and roles
//! - [`build_executor_role`]: deploys the `<id>--cicd` stack and passes the orchestrator role to it
//! - [`attach_conditional_scope`]: narrows a statement; repeated use only intersects
//! - [`BootstrapPlan`]: both roles, rendered as a stack template with a stable fingerprint
//! - [`check_isolation`]: proves a plan cannot reach another project's names
//! - [`RoleCreationGuard`]: child-template rule covering what IAM conditions cannot
//!
//! # Example
//!
//! ```rust
//! use sbp_policy::{BootstrapConfig, BootstrapPlan, ProjectIdentifier, Region};
//!
//! let config = BootstrapConfig::new(ProjectIdentifier::parse("salesforce-apex-mocks").unwrap())
//!     .with_region(Region::parse("eu-west-1").unwrap());
//! let plan = BootstrapPlan::build(&config).unwrap();
//!
//! let template = plan.to_template(&config.render_context());
//! assert_eq!(
//!     template["Resources"]["OrchestratorRole"]["Properties"]["RoleName"],
//!     "salesforce-apex-mocks--cicd"
//! );
//! assert_eq!(plan.fingerprint(), BootstrapPlan::build(&config).unwrap().fingerprint());
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod executor;
pub mod extensions;
pub mod guard;
pub mod isolation;
pub mod orchestrator;
pub mod plan;
pub mod scope;

// Re-exports
pub use config::BootstrapConfig;
pub use error::{ConfigError, PolicyError, Result};
pub use executor::{build_executor_role, executor_role, executor_role_with};
pub use extensions::Extension;
pub use guard::{GuardViolation, RoleCreationGuard};
pub use isolation::{
    candidate_names, check_isolation, check_projects, child_names, IsolationReport, Overlap,
};
pub use orchestrator::{build_orchestrator_role, orchestrator_role};
pub use plan::{BootstrapPlan, BootstrapPlanBuilder, PlanFingerprint};
pub use scope::{attach_conditional_scope, attach_conditional_scope_with};

pub use sbp_model::{AccountId, Partition, ProjectIdentifier, Region, RenderContext, RoleDescriptor};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for plan synthesis
    pub use crate::{
        build_executor_role, build_orchestrator_role, check_isolation, BootstrapConfig,
        BootstrapPlan, Extension, PolicyError, RoleCreationGuard,
    };
    pub use sbp_model::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
