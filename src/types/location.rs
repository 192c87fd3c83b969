//! Diff request value types: versions, generator features and locations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::key::CacheKey;
use crate::{Result, ScaffdiffError};

/// Separator between the two versions in a page slug.
const SLUG_VERSION_SEPARATOR: &str = "..";

// ============================================================================
// Version
// ============================================================================

/// Dotted `major.minor.patch` release version of the generator.
///
/// Ordering is numeric per component, so `7.10.0 > 7.9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = ScaffdiffError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ScaffdiffError::InvalidLocation(format!("malformed version '{s}'"));

        let mut parts = s.split('.');
        let mut next = || -> Result<u64> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let version = Version::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ============================================================================
// Feature
// ============================================================================

/// Optional package the generator can add to a scaffolded project.
///
/// The vocabulary is closed; variants are declared in lexical order of
/// their wire names so iteration order is also key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    NextAuth,
    Prisma,
    Tailwind,
    Trpc,
}

impl Feature {
    /// Every feature, in lexical order of [`Feature::as_str`].
    pub const ALL: [Feature; 4] = [
        Feature::NextAuth,
        Feature::Prisma,
        Feature::Tailwind,
        Feature::Trpc,
    ];

    /// Name used in cache keys, slugs and generator flags.
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::NextAuth => "nextAuth",
            Feature::Prisma => "prisma",
            Feature::Tailwind => "tailwind",
            Feature::Trpc => "trpc",
        }
    }

    /// Generator argument enabling this feature, e.g. `--prisma=true`.
    pub fn flag(self) -> String {
        format!("--{}=true", self.as_str())
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl FromStr for Feature {
    type Err = ScaffdiffError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ScaffdiffError::InvalidLocation(format!("unknown feature '{s}'")))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FeatureSet
// ============================================================================

/// Set of enabled features. Absent means disabled.
///
/// Stored as a bitmask, so equality does not depend on the order in which
/// features were toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeatureSet {
    bits: u8,
}

impl FeatureSet {
    /// Number of distinct feature sets in the vocabulary.
    pub const COMBINATIONS: u8 = 1 << Feature::ALL.len();

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from a bitmask; bits outside the vocabulary are dropped.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            bits: bits & (Self::COMBINATIONS - 1),
        }
    }

    pub fn bits(self) -> u8 {
        self.bits
    }

    /// Return a copy with `feature` switched on or off.
    pub fn with(mut self, feature: Feature, enabled: bool) -> Self {
        self.set(feature, enabled);
        self
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        if enabled {
            self.bits |= feature.bit();
        } else {
            self.bits &= !feature.bit();
        }
    }

    pub fn contains(self, feature: Feature) -> bool {
        self.bits & feature.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Enabled features in lexical order.
    pub fn iter(self) -> impl Iterator<Item = Feature> {
        Feature::ALL.into_iter().filter(move |f| self.contains(*f))
    }

    /// Hyphen-joined enabled feature names, empty when nothing is enabled.
    pub fn suffix(self) -> String {
        self.iter()
            .map(Feature::as_str)
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Parse a `{name: bool}` mapping. Unknown names are rejected, false
    /// values are treated like absent keys.
    pub fn from_flags<'a, I>(flags: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut set = FeatureSet::empty();
        for (name, enabled) in flags {
            let feature: Feature = name.parse()?;
            if enabled {
                set.set(feature, true);
            }
        }
        Ok(set)
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        iter.into_iter()
            .fold(FeatureSet::empty(), |set, f| set.with(f, true))
    }
}

// ============================================================================
// DiffLocation
// ============================================================================

/// One diff request: upgrade a project generated at `current` to `upgrade`
/// with the given features enabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiffLocation {
    current: Version,
    upgrade: Version,
    features: FeatureSet,
}

impl DiffLocation {
    pub fn new(current: Version, upgrade: Version, features: FeatureSet) -> Self {
        Self {
            current,
            upgrade,
            features,
        }
    }

    /// Validate raw version strings and build a location.
    pub fn parse(current: &str, upgrade: &str, features: FeatureSet) -> Result<Self> {
        Ok(Self::new(current.parse()?, upgrade.parse()?, features))
    }

    /// Parse a page slug such as `7.0.0..7.5.0-prisma-tailwind`.
    ///
    /// Empty feature segments are ignored, so a trailing `-` is accepted.
    /// Anything else that does not fit the pattern is rejected whole.
    pub fn from_slug(slug: &str) -> Result<Self> {
        let (current, rest) = slug.split_once(SLUG_VERSION_SEPARATOR).ok_or_else(|| {
            ScaffdiffError::InvalidLocation(format!("slug '{slug}' has no version range"))
        })?;
        let (upgrade, features) = match rest.split_once('-') {
            Some((upgrade, features)) => (upgrade, features),
            None => (rest, ""),
        };
        let features = features
            .split('-')
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Feature>>>()?
            .into_iter()
            .collect();
        Self::parse(current, upgrade, features)
    }

    /// Canonical page slug for this location.
    pub fn to_slug(&self) -> String {
        let suffix = self.features.suffix();
        if suffix.is_empty() {
            format!("{}{SLUG_VERSION_SEPARATOR}{}", self.current, self.upgrade)
        } else {
            format!(
                "{}{SLUG_VERSION_SEPARATOR}{}-{suffix}",
                self.current, self.upgrade
            )
        }
    }

    pub fn current(&self) -> Version {
        self.current
    }

    pub fn upgrade(&self) -> Version {
        self.upgrade
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// Generator arguments for the enabled features.
    pub fn generator_flags(&self) -> Vec<String> {
        self.features.iter().map(Feature::flag).collect()
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(self)
    }
}

impl fmt::Display for DiffLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_slug())
    }
}
