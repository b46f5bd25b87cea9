//! Deployment target: partition, region and account
//!
//! All three are pasted into every rendered ARN, so they are validated
//! before a [`RenderContext`](crate::RenderContext) can hold them. A `*` or
//! a `:` here would widen every grant at once.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

static REGION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{2}(?:-[a-z]+)+-[0-9]$").unwrap());
static ACCOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{12}$").unwrap());

/// ARN partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Partition {
    /// Commercial regions
    #[default]
    Aws,
    /// China regions
    AwsCn,
    /// GovCloud regions
    AwsUsGov,
}

impl Partition {
    /// Every known partition
    pub const ALL: [Self; 3] = [Self::Aws, Self::AwsCn, Self::AwsUsGov];

    /// Parse a partition name
    ///
    /// # Errors
    /// [`ModelError::InvalidTarget`] for anything but `aws`, `aws-cn` and
    /// `aws-us-gov`.
    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == value)
            .ok_or_else(|| {
                ModelError::invalid_target("partition", value, "expected aws, aws-cn or aws-us-gov")
            })
    }

    /// Partition name as it appears in ARNs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::AwsCn => "aws-cn",
            Self::AwsUsGov => "aws-us-gov",
        }
    }
}

impl Display for Partition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Partition {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Partition> for String {
    fn from(partition: Partition) -> Self {
        partition.as_str().to_string()
    }
}

/// Region code such as `eu-west-1`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    /// Validate a region code
    ///
    /// # Errors
    /// [`ModelError::InvalidTarget`] unless the value looks like
    /// `<area>-<direction>-<n>`.
    pub fn parse(value: &str) -> Result<Self> {
        if !REGION.is_match(value) {
            return Err(ModelError::invalid_target(
                "region",
                value,
                "expected a region code such as us-east-1",
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// Borrow the region code
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Region {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Region {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

/// Twelve-digit account id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Validate an account id
    ///
    /// # Errors
    /// [`ModelError::InvalidTarget`] unless the value is exactly 12 digits.
    pub fn parse(value: &str) -> Result<Self> {
        if !ACCOUNT.is_match(value) {
            return Err(ModelError::invalid_target("account", value, "expected exactly 12 digits"));
        }
        Ok(Self(value.to_string()))
    }

    /// Borrow the account id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AccountId> for String {
    fn from(account: AccountId) -> Self {
        account.0
    }
}
