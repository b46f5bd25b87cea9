//! Service principals that bootstrap roles trust

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The single service a role's trust policy names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustedPrincipal {
    /// Resource orchestration service (`cloudformation.amazonaws.com`)
    Orchestrator,
    /// Build execution service (`codebuild.amazonaws.com`)
    BuildExecutor,
}

impl TrustedPrincipal {
    /// Service principal name used in trust policies and conditions
    #[must_use]
    pub const fn service_name(self) -> &'static str {
        match self {
            Self::Orchestrator => "cloudformation.amazonaws.com",
            Self::BuildExecutor => "codebuild.amazonaws.com",
        }
    }

    /// Name of the bootstrap role this principal assumes, in statement ids
    #[must_use]
    pub const fn role_label(self) -> &'static str {
        match self {
            Self::Orchestrator => "Orchestrator",
            Self::BuildExecutor => "BuildExecutor",
        }
    }

    /// Reverse lookup from a service principal name
    #[must_use]
    pub fn from_service_name(name: &str) -> Option<Self> {
        [Self::Orchestrator, Self::BuildExecutor]
            .into_iter()
            .find(|p| p.service_name() == name)
    }
}

impl Display for TrustedPrincipal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_names_round_trip() {
        for p in [TrustedPrincipal::Orchestrator, TrustedPrincipal::BuildExecutor] {
            assert_eq!(TrustedPrincipal::from_service_name(p.service_name()), Some(p));
        }
        assert_eq!(TrustedPrincipal::from_service_name("lambda.amazonaws.com"), None);
    }
}
