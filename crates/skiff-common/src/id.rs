//! Container ID and registry type identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{SkiffError, SkiffResult};

/// A validated container ID, as assigned by the engine.
///
/// Container IDs must:
/// - Be 1-64 characters long
/// - Contain only alphanumeric characters, hyphens, and underscores
/// - Start with an alphanumeric character
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Maximum length of a container ID.
    pub const MAX_LENGTH: usize = 64;

    /// Length of the abbreviated form used in messages.
    pub const SHORT_LENGTH: usize = 12;

    /// Create a new container ID, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID format is invalid.
    pub fn new(id: impl Into<String>) -> SkiffResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a container ID without validation.
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the container ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> SkiffResult<()> {
        let invalid = || SkiffError::Config {
            message: format!("invalid container id: {id:?}"),
        };

        if id.is_empty() || id.len() > Self::MAX_LENGTH {
            return Err(invalid());
        }

        if !id.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        if id
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != '-' && c != '_')
        {
            return Err(invalid());
        }

        Ok(())
    }

    /// Returns a short version of the ID (first 12 characters).
    #[must_use]
    pub fn short(&self) -> &str {
        if self.0.len() <= Self::SHORT_LENGTH {
            &self.0
        } else {
            &self.0[..Self::SHORT_LENGTH]
        }
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = SkiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Small integer identifying the kind of service a container provides.
///
/// Sibling containers on one network are bucketed by this value so they can
/// look each other up by type. Only [`TypeId::MAX`] buckets exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TypeId(u8);

impl TypeId {
    /// Number of registry buckets.
    pub const MAX: u8 = 40;

    /// Create a type identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::InvalidTypeId`] when `value >= TypeId::MAX`.
    pub fn new(value: u8) -> SkiffResult<Self> {
        if value >= Self::MAX {
            return Err(SkiffError::InvalidTypeId {
                value,
                max: Self::MAX,
            });
        }
        Ok(Self(value))
    }

    /// Bucket index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for TypeId {
    type Error = SkiffError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TypeId> for u8 {
    fn from(id: TypeId) -> Self {
        id.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_container_ids() {
        assert!(ContainerId::new("abc123").is_ok());
        assert!(ContainerId::new("my-container").is_ok());
        assert!(ContainerId::new("my_container").is_ok());
        assert!(ContainerId::new("a".repeat(64)).is_ok());
    }

    #[test]
    fn invalid_container_ids() {
        assert!(ContainerId::new("").is_err());
        assert!(ContainerId::new("-invalid").is_err());
        assert!(ContainerId::new("invalid!").is_err());
        assert!(ContainerId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn short_id() {
        let id = ContainerId::new("4f1c2d3e4a5b6c7d8e9f").unwrap();
        assert_eq!(id.short(), "4f1c2d3e4a5b");

        let tiny = ContainerId::new("abc").unwrap();
        assert_eq!(tiny.short(), "abc");
    }

    #[test]
    fn type_id_bounds() {
        assert_eq!(TypeId::new(0).unwrap().index(), 0);
        assert_eq!(TypeId::new(39).unwrap().get(), 39);
        assert!(matches!(
            TypeId::new(40),
            Err(SkiffError::InvalidTypeId { value: 40, max: 40 })
        ));
    }

    proptest! {
        #[test]
        fn type_id_accepts_exactly_the_bucket_range(value in any::<u8>()) {
            prop_assert_eq!(TypeId::new(value).is_ok(), value < TypeId::MAX);
        }
    }
}
