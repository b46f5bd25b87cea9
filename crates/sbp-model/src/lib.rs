//! SBP Model
//!
//! Typed descriptors for project-scoped bootstrap permissions.
//!
//! # Overview
//!
//! - **ProjectIdentifier**: validated, delimiter-free project name
//! - **ResourcePattern**: structured resource template, rendered to ARN syntax at the boundary
//! - **PermissionStatement**: one scoped grant with optional conditions
//! - **RoleDescriptor**: one trust relationship plus its owned statements
//! - **PassRoleGrant**: the single inter-role trust edge
//! - **Region / AccountId / Partition**: validated deployment target
//!
//! # Example
//!
//! ```rust
//! use sbp_model::{
//!     actions, NamePrefix, PermissionStatement, ProjectIdentifier, RenderContext, ResourceKind,
//!     ResourcePattern, Service,
//! };
//!
//! let id = ProjectIdentifier::parse("foo").unwrap();
//! let stmt = PermissionStatement::new(
//!     actions(Service::CodeBuild, &["CreateProject"]).unwrap(),
//!     [ResourcePattern::prefixed(ResourceKind::Project, NamePrefix::Build, &id)],
//! )
//! .unwrap();
//! assert_eq!(stmt.project(), Some(&id));
//! assert_eq!(
//!     stmt.rendered_resources(&RenderContext::new()),
//!     vec!["arn:aws:codebuild:${AWS::Region}:${AWS::AccountId}:project/build-foo--*".to_string()]
//! );
//! ```

#![warn(missing_docs)]

pub mod action;
pub mod condition;
pub mod error;
pub mod ident;
pub mod pattern;
pub mod principal;
pub mod role;
pub mod statement;
pub mod target;

// Re-exports
pub use action::{actions, Action, Service};
pub use condition::{ConditionKey, ConditionOperator, ConditionValue, Conditions};
pub use error::{ModelError, Result};
pub use ident::{is_valid_project_identifier, ProjectIdentifier, Suffix, DELIMITER, MAX_PROJECT_ID_LEN};
pub use pattern::{
    wildcard_match, NamePrefix, NameScope, RenderContext, ResourceKind, ResourceName, ResourcePattern,
    BOOTSTRAP_ROLE_PATH,
};
pub use principal::TrustedPrincipal;
pub use role::{PassRoleGrant, RoleDescriptor, MAX_ROLE_NAME_LEN, POLICY_VERSION};
pub use statement::PermissionStatement;
pub use target::{AccountId, Partition, Region};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for descriptor construction
    pub use crate::{
        Action, ConditionKey, ConditionValue, ModelError, NamePrefix, PermissionStatement,
        ProjectIdentifier, RenderContext, ResourceKind, ResourcePattern, RoleDescriptor, Service,
        Suffix, TrustedPrincipal,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
