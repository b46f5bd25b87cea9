//! Conditional narrowing of statements
//!
//! The only way to add a condition to a grant. Attaching a key that is
//! already present intersects the value sets, so repeated narrowing can only
//! shrink what a statement allows. An empty result is an error, not a
//! silently dead grant.

use std::collections::BTreeSet;

use sbp_model::{ConditionKey, ConditionOperator, ConditionValue, ModelError, PermissionStatement};

use crate::error::Result;

/// Narrow `statement` with a `StringEquals` condition on `key`
///
/// # Errors
/// [`ModelError::InvalidCondition`] if `allowed_values` is empty, holds a
/// wildcard, or has no overlap with values already attached for `key`.
///
/// # Example
/// ```
/// use sbp_model::{actions, ConditionKey, ConditionValue, PermissionStatement, ResourceKind,
///     ResourcePattern, Service};
/// use sbp_policy::attach_conditional_scope;
///
/// let stmt = PermissionStatement::new(
///     actions(Service::CloudFormation, &["DescribeStacks"]).unwrap(),
///     [ResourcePattern::unscoped(ResourceKind::Stack)],
/// )
/// .unwrap();
/// let narrowed = attach_conditional_scope(
///     stmt,
///     "aws:RequestedRegion".parse::<ConditionKey>().unwrap(),
///     [ConditionValue::Literal("eu-west-1".into())],
/// )
/// .unwrap();
/// assert_eq!(narrowed.conditions().len(), 1);
/// ```
pub fn attach_conditional_scope(
    statement: PermissionStatement,
    key: ConditionKey,
    allowed_values: impl IntoIterator<Item = ConditionValue>,
) -> Result<PermissionStatement> {
    attach_conditional_scope_with(statement, ConditionOperator::StringEquals, key, allowed_values)
}

/// Narrow `statement` under an explicit operator
///
/// # Errors
/// See [`attach_conditional_scope`].
pub fn attach_conditional_scope_with(
    statement: PermissionStatement,
    operator: ConditionOperator,
    key: ConditionKey,
    allowed_values: impl IntoIterator<Item = ConditionValue>,
) -> Result<PermissionStatement> {
    let requested: BTreeSet<ConditionValue> = allowed_values.into_iter().collect();
    if requested.is_empty() {
        return Err(ModelError::invalid_condition(key.as_str(), "no allowed values").into());
    }

    let narrowed = match statement.conditions().get(operator, &key) {
        Some(existing) => {
            let both: BTreeSet<ConditionValue> = existing.intersection(&requested).cloned().collect();
            if both.is_empty() {
                return Err(ModelError::invalid_condition(
                    key.as_str(),
                    "intersection with existing values is empty",
                )
                .into());
            }
            both
        }
        None => requested,
    };

    tracing::trace!(key = %key, operator = %operator, values = narrowed.len(), "narrowing statement");
    let conditions = statement.conditions().clone().with(operator, key, narrowed)?;
    Ok(statement.with_conditions(conditions))
}
