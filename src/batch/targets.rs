//! Candidate diff locations for backfill.

use async_trait::async_trait;

use crate::types::{DiffLocation, FeatureSet, Version};
use crate::Result;

/// Supplies the upstream versions a backfill should cover.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn versions(&self) -> Result<Vec<Version>>;
}

/// Fixed version list, usually from `[versions] known` in the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticVersions {
    versions: Vec<Version>,
}

impl StaticVersions {
    pub fn new(versions: Vec<Version>) -> Self {
        Self { versions }
    }
}

#[async_trait]
impl VersionSource for StaticVersions {
    async fn versions(&self) -> Result<Vec<Version>> {
        Ok(self.versions.clone())
    }
}

/// Every upgrade path between `versions`, with every feature combination.
///
/// Versions are sorted and deduplicated first. Pairs come out ordered by
/// current then upgrade version, and within a pair feature sets are
/// ordered by bitmask, so the result is stable across calls.
pub fn targets_for_versions(versions: &[Version]) -> Vec<DiffLocation> {
    let mut versions = versions.to_vec();
    versions.sort();
    versions.dedup();

    let mut targets = Vec::new();
    for (i, &current) in versions.iter().enumerate() {
        for &upgrade in &versions[i + 1..] {
            for bits in 0..FeatureSet::COMBINATIONS {
                targets.push(DiffLocation::new(
                    current,
                    upgrade,
                    FeatureSet::from_bits(bits),
                ));
            }
        }
    }
    targets
}
