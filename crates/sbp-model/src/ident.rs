//! Project identifiers and name suffixes
//!
//! A [`ProjectIdentifier`] is the only caller-supplied string that flows into
//! resource patterns, so it is validated once, here, and carried as a typed
//! value afterwards. The `--` sequence is reserved as the delimiter between
//! the identifier and a resource suffix; forbidding it inside identifiers is
//! what keeps `build-foo--*` from ever matching `build-foo--bar--x` owned by
//! a project called `foo--bar`.
//!
//! Identifiers also may not begin with a child head (`build-`, `pr-`).
//! `build-foo--cicd` is a child project of `foo`, and the log and report
//! groups CodeBuild derives from it would otherwise also belong to a
//! project called `build-foo`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::pattern::NamePrefix;

/// Delimiter between a project identifier and a resource suffix
pub const DELIMITER: &str = "--";

/// Longest accepted identifier
///
/// The longest derived name is `<id>--cicd-deployment`, and IAM role names
/// are limited to 64 characters.
pub const MAX_PROJECT_ID_LEN: usize = 47;

/// Longest accepted suffix
pub const MAX_SUFFIX_LEN: usize = 32;

static SEGMENTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

/// Check a string against the project identifier grammar
#[must_use]
pub fn is_valid_project_identifier(value: &str) -> bool {
    check_project_identifier(value).is_ok()
}

fn check_project_identifier(value: &str) -> std::result::Result<(), String> {
    check_segmented(value, MAX_PROJECT_ID_LEN)?;
    if let Some(prefix) = NamePrefix::ALL
        .into_iter()
        .find(|p| value.strip_prefix(p.as_str()).is_some_and(|rest| rest.starts_with('-')))
    {
        return Err(format!("must not start with the reserved child prefix '{prefix}-'"));
    }
    Ok(())
}

/// Explain why `value` is not a single-hyphen segmented name, if it isn't
fn check_segmented(value: &str, max: usize) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_string());
    }
    if value.len() > max {
        return Err(format!("must be at most {max} characters"));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(format!(
            "invalid character '{c}' (only lowercase letters, digits and '-')"
        ));
    }
    if value.starts_with('-') {
        return Err("must not start with '-'".to_string());
    }
    if value.ends_with('-') {
        return Err("must not end with '-'".to_string());
    }
    if value.contains(DELIMITER) {
        return Err(format!("must not contain the reserved delimiter '{DELIMITER}'"));
    }
    if !SEGMENTED.is_match(value) {
        return Err("does not match the identifier grammar".to_string());
    }
    Ok(())
}

/// Validated project identifier
///
/// # Examples
/// ```
/// use sbp_model::ProjectIdentifier;
///
/// let id = ProjectIdentifier::parse("salesforce-apex-mocks").unwrap();
/// assert_eq!(id.as_str(), "salesforce-apex-mocks");
///
/// assert!(ProjectIdentifier::parse("foo--bar").is_err());
/// assert!(ProjectIdentifier::parse("-foo").is_err());
/// assert!(ProjectIdentifier::parse("Foo").is_err());
/// assert!(ProjectIdentifier::parse("build-foo").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectIdentifier(String);

impl ProjectIdentifier {
    /// Validate and wrap a project identifier
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidIdentifier`] if the input breaks the
    /// grammar or starts with a child prefix. The input is never sanitized.
    pub fn parse(value: &str) -> Result<Self> {
        check_project_identifier(value)
            .map_err(|reason| ModelError::invalid_identifier(value, reason))?;
        Ok(Self(value.to_string()))
    }

    /// Borrow the identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<id>--<suffix>`
    #[must_use]
    pub fn owned_name(&self, suffix: &Suffix) -> String {
        format!("{}{DELIMITER}{}", self.0, suffix.as_str())
    }
}

impl Display for ProjectIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectIdentifier {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProjectIdentifier {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ProjectIdentifier {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ProjectIdentifier> for String {
    fn from(id: ProjectIdentifier) -> Self {
        id.0
    }
}

impl AsRef<str> for ProjectIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name tail after the `--` delimiter
///
/// Same grammar as a project identifier, so a suffix can never smuggle in a
/// second delimiter or a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Suffix(String);

impl Suffix {
    /// Suffix of the bootstrap stack and of the orchestrator role
    pub const CICD: &'static str = "cicd";

    /// Suffix of the build-executor role
    pub const CICD_DEPLOYMENT: &'static str = "cicd-deployment";

    /// Validate and wrap a suffix
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidSuffix`] on grammar violations.
    pub fn parse(value: &str) -> Result<Self> {
        check_segmented(value, MAX_SUFFIX_LEN).map_err(|reason| ModelError::InvalidSuffix {
            value: value.to_string(),
            reason,
        })?;
        Ok(Self(value.to_string()))
    }

    /// The `cicd` suffix
    #[must_use]
    pub fn cicd() -> Self {
        Self(Self::CICD.to_string())
    }

    /// The `cicd-deployment` suffix
    #[must_use]
    pub fn cicd_deployment() -> Self {
        Self(Self::CICD_DEPLOYMENT.to_string())
    }

    /// Borrow the suffix
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Suffix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Suffix {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Suffix {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Suffix> for String {
    fn from(suffix: Suffix) -> Self {
        suffix.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_hyphen_names() {
        for ok in ["a", "foo", "foo-bar", "salesforce-apex-mocks", "a1-2b", "123"] {
            assert!(is_valid_project_identifier(ok), "{ok} should be valid");
        }
    }

    #[test]
    fn rejects_reserved_delimiter() {
        let err = ProjectIdentifier::parse("foo--bar").unwrap_err();
        match err {
            ModelError::InvalidIdentifier { value, reason } => {
                assert_eq!(value, "foo--bar");
                assert!(reason.contains("--"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_edge_hyphens_and_bad_characters() {
        for bad in ["", "-foo", "foo-", "-", "Foo", "foo_bar", "foo.bar", "foo bar", "föo", "foo*"] {
            assert!(!is_valid_project_identifier(bad), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn rejects_child_heads() {
        for bad in ["build-x", "pr-x", "build-salesforce-apex-mocks", "pr-1"] {
            match ProjectIdentifier::parse(bad).unwrap_err() {
                ModelError::InvalidIdentifier { reason, .. } => {
                    assert!(reason.contains("reserved child prefix"), "{bad}: {reason}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        for ok in ["build", "pr", "builds-x", "prx", "x-build", "x-pr"] {
            assert!(is_valid_project_identifier(ok), "{ok} should be valid");
        }
    }

    #[test]
    fn suffixes_may_use_child_heads() {
        assert!(Suffix::parse("build-main").is_ok());
    }

    #[test]
    fn rejects_overlong_identifier() {
        let long = "a".repeat(MAX_PROJECT_ID_LEN + 1);
        assert!(ProjectIdentifier::parse(&long).is_err());
        let max = "a".repeat(MAX_PROJECT_ID_LEN);
        assert!(ProjectIdentifier::parse(&max).is_ok());
    }

    #[test]
    fn serde_revalidates() {
        let ok: ProjectIdentifier = serde_json::from_str("\"foo-bar\"").unwrap();
        assert_eq!(ok.as_str(), "foo-bar");
        assert!(serde_json::from_str::<ProjectIdentifier>("\"foo--bar\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"foo-bar\"");
    }

    #[test]
    fn owned_name_uses_delimiter() {
        let id = ProjectIdentifier::parse("foo").unwrap();
        assert_eq!(id.owned_name(&Suffix::cicd()), "foo--cicd");
        assert_eq!(id.owned_name(&Suffix::cicd_deployment()), "foo--cicd-deployment");
    }

    #[test]
    fn suffix_rejects_wildcards_and_delimiters() {
        assert!(Suffix::parse("unit-tests").is_ok());
        assert!(Suffix::parse("*").is_err());
        assert!(Suffix::parse("a--b").is_err());
        assert!(Suffix::parse("").is_err());
    }
}
