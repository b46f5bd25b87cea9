//! Statement conditions
//!
//! Conditions only ever narrow a grant. Values are kept in ordered sets so
//! rendering is deterministic, and wildcard values are rejected outright:
//! a `StringEquals` on `*` would read as a restriction while granting
//! nothing of the sort.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::pattern::{RenderContext, ResourcePattern};
use crate::principal::TrustedPrincipal;

/// Condition operators used by bootstrap grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// Exact, case-sensitive string comparison
    StringEquals,
    /// Glob string comparison
    StringLike,
    /// Exact ARN comparison
    ArnEquals,
}

impl ConditionOperator {
    /// Operator name as written in policy documents
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StringEquals => "StringEquals",
            Self::StringLike => "StringLike",
            Self::ArnEquals => "ArnEquals",
        }
    }
}

impl Display for ConditionOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition context key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConditionKey {
    /// `cloudformation:RoleArn`
    CloudFormationRoleArn,
    /// `iam:PassedToService`
    PassedToService,
    /// `iam:AssociatedResourceArn`
    AssociatedResourceArn,
    /// Any other `prefix:Name` key
    Other(String),
}

impl ConditionKey {
    /// Key as written in policy documents
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CloudFormationRoleArn => "cloudformation:RoleArn",
            Self::PassedToService => "iam:PassedToService",
            Self::AssociatedResourceArn => "iam:AssociatedResourceArn",
            Self::Other(key) => key,
        }
    }
}

impl Display for ConditionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cloudformation:RoleArn" => return Ok(Self::CloudFormationRoleArn),
            "iam:PassedToService" => return Ok(Self::PassedToService),
            "iam:AssociatedResourceArn" => return Ok(Self::AssociatedResourceArn),
            _ => {}
        }
        let well_formed = s.split_once(':').is_some_and(|(prefix, name)| {
            !prefix.is_empty()
                && prefix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '/' || c == '-')
        });
        if !well_formed {
            return Err(ModelError::invalid_condition(s, "key must look like 'prefix:Name'"));
        }
        Ok(Self::Other(s.to_string()))
    }
}

impl TryFrom<String> for ConditionKey {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ConditionKey> for String {
    fn from(key: ConditionKey) -> Self {
        key.as_str().to_string()
    }
}

/// Allowed value of a condition key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ConditionValue {
    /// Literal string
    Literal(String),
    /// Service principal name
    Service(TrustedPrincipal),
    /// ARN of a resource, rendered with the document's context
    Resource(ResourcePattern),
}

impl ConditionValue {
    /// Whether the value could match more than one thing
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        match self {
            Self::Literal(s) => s.is_empty() || s.contains('*') || s.contains('?'),
            Self::Service(_) => false,
            Self::Resource(p) => p.contains_wildcard(),
        }
    }

    /// Rendered string
    #[must_use]
    pub fn render(&self, ctx: &RenderContext) -> String {
        match self {
            Self::Literal(s) => s.clone(),
            Self::Service(p) => p.service_name().to_string(),
            Self::Resource(p) => p.render(ctx),
        }
    }
}

impl From<TrustedPrincipal> for ConditionValue {
    fn from(p: TrustedPrincipal) -> Self {
        Self::Service(p)
    }
}

impl From<ResourcePattern> for ConditionValue {
    fn from(p: ResourcePattern) -> Self {
        Self::Resource(p)
    }
}

type KeyValues = BTreeMap<ConditionKey, BTreeSet<ConditionValue>>;

/// Operator → key → allowed values
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conditions(BTreeMap<ConditionOperator, KeyValues>);

impl Conditions {
    /// No conditions
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any condition is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of (operator, key) entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Allowed values for a key under an operator
    #[must_use]
    pub fn get(&self, operator: ConditionOperator, key: &ConditionKey) -> Option<&BTreeSet<ConditionValue>> {
        self.0.get(&operator).and_then(|keys| keys.get(key))
    }

    /// Iterate `(operator, key, values)` in render order
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (ConditionOperator, &ConditionKey, &BTreeSet<ConditionValue>)> {
        self.0
            .iter()
            .flat_map(|(op, keys)| keys.iter().map(move |(k, v)| (*op, k, v)))
    }

    /// Replace the value set of one key
    ///
    /// # Errors
    /// [`ModelError::InvalidCondition`] if `values` is empty or holds a
    /// wildcard.
    pub fn with(
        mut self,
        operator: ConditionOperator,
        key: ConditionKey,
        values: BTreeSet<ConditionValue>,
    ) -> Result<Self> {
        if values.is_empty() {
            return Err(ModelError::invalid_condition(key.as_str(), "no allowed values"));
        }
        if let Some(wild) = values.iter().find(|v| v.is_wildcard()) {
            return Err(ModelError::invalid_condition(
                key.as_str(),
                format!("wildcard value {wild:?}"),
            ));
        }
        self.0.entry(operator).or_default().insert(key, values);
        Ok(self)
    }

    /// Render as a policy `Condition` block
    ///
    /// A single value renders as a string, several as an array.
    #[must_use]
    pub fn render(&self, ctx: &RenderContext) -> Value {
        let mut out = serde_json::Map::new();
        for (op, keys) in &self.0 {
            let mut block = serde_json::Map::new();
            for (key, values) in keys {
                let mut rendered: Vec<String> = values.iter().map(|v| v.render(ctx)).collect();
                rendered.sort();
                rendered.dedup();
                let value = if rendered.len() == 1 {
                    Value::String(rendered.remove(0))
                } else {
                    Value::Array(rendered.into_iter().map(Value::String).collect())
                };
                block.insert(key.as_str().to_string(), value);
            }
            out.insert(op.as_str().to_string(), Value::Object(block));
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{ProjectIdentifier, Suffix};
    use crate::pattern::ResourceKind;
    use serde_json::json;

    fn set(values: impl IntoIterator<Item = ConditionValue>) -> BTreeSet<ConditionValue> {
        values.into_iter().collect()
    }

    #[test]
    fn parses_known_and_other_keys() {
        assert_eq!(
            "iam:PassedToService".parse::<ConditionKey>().unwrap(),
            ConditionKey::PassedToService
        );
        let other: ConditionKey = "aws:RequestTag/automation-group".parse().unwrap();
        assert_eq!(other.as_str(), "aws:RequestTag/automation-group");
        assert!("NoPrefix".parse::<ConditionKey>().is_err());
        assert!(":Name".parse::<ConditionKey>().is_err());
    }

    #[test]
    fn rejects_empty_and_wildcard_values() {
        let empty = Conditions::new().with(
            ConditionOperator::StringEquals,
            ConditionKey::PassedToService,
            BTreeSet::new(),
        );
        assert!(matches!(empty, Err(ModelError::InvalidCondition { .. })));

        let wild = Conditions::new().with(
            ConditionOperator::StringEquals,
            ConditionKey::PassedToService,
            set([ConditionValue::Literal("*".into())]),
        );
        assert!(matches!(wild, Err(ModelError::InvalidCondition { .. })));

        let id = ProjectIdentifier::parse("foo").unwrap();
        let wild_arn = Conditions::new().with(
            ConditionOperator::StringEquals,
            ConditionKey::AssociatedResourceArn,
            set([ResourcePattern::owned_any(ResourceKind::Stack, &id).into()]),
        );
        assert!(wild_arn.is_err());
    }

    #[test]
    fn renders_single_value_as_string() {
        let id = ProjectIdentifier::parse("foo").unwrap();
        let ctx = RenderContext::resolved("us-east-1", "111122223333").unwrap();
        let c = Conditions::new()
            .with(
                ConditionOperator::StringEquals,
                ConditionKey::PassedToService,
                set([TrustedPrincipal::Orchestrator.into()]),
            )
            .unwrap()
            .with(
                ConditionOperator::StringEquals,
                ConditionKey::AssociatedResourceArn,
                set([ResourcePattern::owned(ResourceKind::Stack, &id, Suffix::cicd()).into()]),
            )
            .unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(
            c.render(&ctx),
            json!({
                "StringEquals": {
                    "iam:AssociatedResourceArn": "arn:aws:cloudformation:us-east-1:111122223333:stack/foo--cicd",
                    "iam:PassedToService": "cloudformation.amazonaws.com"
                }
            })
        );
    }
}
