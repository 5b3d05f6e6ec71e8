use derive_more::Display;
use thiserror::Error;

use super::{StoreKey, StoreKeyError};

/// A store prefix: a (possibly empty) path ending in `/` under which keys are grouped.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StorePrefix(String);

/// An invalid store prefix.
#[derive(Debug, Error)]
#[error("invalid store prefix {0}")]
pub struct StorePrefixError(String);

impl StorePrefix {
    /// Create a new store prefix from `prefix`.
    ///
    /// # Errors
    /// Returns [`StorePrefixError`] if `prefix` is not valid according to [`StorePrefix::validate`].
    pub fn new(prefix: impl Into<String>) -> Result<Self, StorePrefixError> {
        let prefix = prefix.into();
        if Self::validate(&prefix) {
            Ok(Self(prefix))
        } else {
            Err(StorePrefixError(prefix))
        }
    }

    /// Create a prefix from a `/` separated path, appending the trailing `/` if missing.
    ///
    /// Leading `/` characters are removed.
    ///
    /// # Errors
    /// Returns [`StorePrefixError`] if the normalised path is not a valid prefix.
    pub fn from_path(path: &str) -> Result<Self, StorePrefixError> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            Ok(Self::root())
        } else if path.ends_with('/') {
            Self::new(path)
        } else {
            Self::new(format!("{path}/"))
        }
    }

    pub(crate) fn from_validated(prefix: String) -> Self {
        debug_assert!(Self::validate(&prefix));
        Self(prefix)
    }

    /// The root prefix.
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Extracts a string slice containing the prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the root prefix.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Validates a prefix. A prefix is empty, or ends with `/` and does not start with `/`.
    #[must_use]
    pub fn validate(prefix: &str) -> bool {
        prefix.is_empty() || (prefix.ends_with('/') && !prefix.starts_with('/'))
    }

    /// Join a relative key onto this prefix.
    ///
    /// # Errors
    /// Returns [`StoreKeyError`] if the result is not a valid key.
    pub fn join(&self, key: &str) -> Result<StoreKey, StoreKeyError> {
        StoreKey::new(format!("{}{key}", self.0))
    }

    /// Join a relative path onto this prefix, producing a child prefix.
    ///
    /// # Errors
    /// Returns [`StorePrefixError`] if the result is not a valid prefix.
    pub fn child(&self, path: &str) -> Result<Self, StorePrefixError> {
        Self::from_path(&format!("{}{}", self.0, path.trim_start_matches('/')))
    }
}

impl TryFrom<&str> for StorePrefix {
    type Error = StorePrefixError;

    fn try_from(prefix: &str) -> Result<Self, Self::Error> {
        Self::new(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_prefix() {
        assert!(StorePrefix::new("").is_ok());
        assert!(StorePrefix::new("a/").is_ok());
        assert!(StorePrefix::new("a").is_err());
        assert!(StorePrefix::new("/a/").is_err());
        assert_eq!(
            StorePrefix::new("a").unwrap_err().to_string(),
            "invalid store prefix a"
        );
        assert!(StorePrefix::root().is_root());
    }

    #[test]
    fn store_prefix_from_path() {
        assert_eq!(
            StorePrefix::from_path("datasets/era5.zarr").unwrap().as_str(),
            "datasets/era5.zarr/"
        );
        assert_eq!(
            StorePrefix::from_path("/datasets/").unwrap().as_str(),
            "datasets/"
        );
        assert!(StorePrefix::from_path("").unwrap().is_root());
    }

    #[test]
    fn store_prefix_join() {
        let prefix = StorePrefix::new("metadata/").unwrap();
        assert_eq!(
            prefix.join("Die Hard.json").unwrap().as_str(),
            "metadata/Die Hard.json"
        );
        assert_eq!(
            prefix.child("film").unwrap().as_str(),
            "metadata/film/"
        );
        assert!(StorePrefix::root().join("").is_err());
    }
}
