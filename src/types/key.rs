//! Canonical cache keys and patch file names.

use std::fmt;

use super::location::{DiffLocation, Feature, FeatureSet, Version};
use crate::{Result, ScaffdiffError};

const FILE_PREFIX: &str = "diff-";
const FILE_EXTENSION: &str = ".patch";

/// Identifier of one cached patch: `{current}-{upgrade}[-{features}]`.
///
/// Only enabled features appear in the suffix, lexically sorted, so any two
/// locations with the same versions and the same enabled set share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(location: &DiffLocation) -> Self {
        let suffix = location.features().suffix();
        let key = if suffix.is_empty() {
            format!("{}-{}", location.current(), location.upgrade())
        } else {
            format!("{}-{}-{suffix}", location.current(), location.upgrade())
        };
        Self(key)
    }

    /// Parse a raw key string, accepting only the canonical form.
    pub fn parse(raw: &str) -> Result<Self> {
        let location = Self::location_of(raw)?;
        let key = Self::derive(&location);
        if key.0 != raw {
            return Err(ScaffdiffError::InvalidLocation(format!(
                "'{raw}' is not a canonical cache key (expected '{key}')"
            )));
        }
        Ok(key)
    }

    /// Parse a cache file name (`diff-{key}.patch`).
    ///
    /// Returns `None` for anything that is not a canonical patch file,
    /// including in-progress temporary files.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let raw = name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?;
        Self::parse(raw).ok()
    }

    /// File name of the persisted patch for this key.
    pub fn file_name(&self) -> String {
        format!("{FILE_PREFIX}{}{FILE_EXTENSION}", self.0)
    }

    /// Rebuild the location this key was derived from.
    pub fn to_location(&self) -> Result<DiffLocation> {
        Self::location_of(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn location_of(raw: &str) -> Result<DiffLocation> {
        let invalid = || ScaffdiffError::InvalidLocation(format!("malformed cache key '{raw}'"));

        let mut parts = raw.split('-');
        let current: Version = parts.next().ok_or_else(invalid)?.parse()?;
        let upgrade: Version = parts.next().ok_or_else(invalid)?.parse()?;
        let features = parts
            .map(str::parse)
            .collect::<Result<Vec<Feature>>>()?
            .into_iter()
            .collect::<FeatureSet>();
        Ok(DiffLocation::new(current, upgrade, features))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
