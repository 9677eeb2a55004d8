//! Deployment identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Length of every deployment and resource identifier.
pub const ID_LENGTH: usize = 32;

/// A validated deployment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Validates and wraps an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDeploymentId`] unless the id is
    /// exactly [`ID_LENGTH`] characters long.
    pub fn parse(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.chars().count() == ID_LENGTH {
            Ok(Self(id))
        } else {
            Err(ValidationError::InvalidDeploymentId {
                id,
                expected: ID_LENGTH,
            })
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeploymentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeploymentId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DeploymentId> for String {
    fn from(id: DeploymentId) -> Self {
        id.0
    }
}

impl AsRef<str> for DeploymentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_32_characters() {
        let id = DeploymentId::parse("d324608c97154bdba2dff97511d40368");
        assert!(id.is_ok());
        // Only the length is checked.
        assert!(DeploymentId::parse("z".repeat(32)).is_ok());
    }

    #[test]
    fn test_rejects_other_lengths() {
        for len in [0, 1, 31, 33, 64] {
            let err = DeploymentId::parse("a".repeat(len)).unwrap_err();
            assert!(matches!(err, ValidationError::InvalidDeploymentId { expected: 32, .. }));
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<DeploymentId, _> =
            serde_json::from_str("\"d324608c97154bdba2dff97511d40368\"");
        assert!(ok.is_ok());
        let bad: Result<DeploymentId, _> = serde_json::from_str("\"short\"");
        assert!(bad.is_err());
    }
}
