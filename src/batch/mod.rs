//! Bounded batch generation of missing patches.
//!
//! Work is split into fixed-width groups. Every member of a group runs
//! concurrently; the next group starts only after the current one has
//! fully drained, so at most one group's width of generations is ever in
//! progress. A failure is recorded against its own location and never
//! cancels a sibling.

mod targets;

pub use targets::{StaticVersions, VersionSource, targets_for_versions};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::cache::PatchStore;
use crate::config::DEFAULT_GROUP_SIZE;
use crate::telemetry;
use crate::traits::DiffGenerator;
use crate::types::DiffLocation;
use crate::Result;

/// Result of one location within a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub location: DiffLocation,
    pub result: Result<Arc<str>>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs many diff requests in sequential, width-bounded groups.
pub struct BatchOrchestrator {
    generator: Arc<dyn DiffGenerator>,
    store: Arc<dyn PatchStore>,
    group_size: usize,
}

impl BatchOrchestrator {
    /// `store` is consulted to find which targets still lack a patch.
    pub fn new(generator: Arc<dyn DiffGenerator>, store: Arc<dyn PatchStore>) -> Self {
        Self {
            generator,
            store,
            group_size: DEFAULT_GROUP_SIZE,
        }
    }

    /// Override the group width. Zero is treated as one.
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Targets without a stored patch, in target order, at most `limit` of them.
    ///
    /// Duplicate targets are reported once.
    pub async fn missing(
        &self,
        targets: Vec<DiffLocation>,
        limit: Option<usize>,
    ) -> Result<Vec<DiffLocation>> {
        let present = self.store.list_keys().await?;
        let mut seen = HashSet::new();
        let missing = targets
            .into_iter()
            .filter(|location| {
                let key = location.cache_key();
                !present.contains(&key) && seen.insert(key)
            })
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(missing)
    }

    /// Generate every target that has no stored patch yet.
    ///
    /// Returns one outcome per processed location, in processing order.
    /// Only the initial store listing can fail the call as a whole.
    pub async fn run_missing(
        &self,
        targets: Vec<DiffLocation>,
        limit: Option<usize>,
    ) -> Result<Vec<BatchOutcome>> {
        let missing = self.missing(targets, limit).await?;
        Ok(self.run(missing).await)
    }

    /// Full backfill over every upgrade path between `source`'s versions.
    pub async fn run_all_missing(&self, source: &dyn VersionSource) -> Result<Vec<BatchOutcome>> {
        let versions = source.versions().await?;
        self.run_missing(targets_for_versions(&versions), None).await
    }

    /// Generate `locations` group by group, without consulting the store first.
    pub async fn run(&self, locations: Vec<DiffLocation>) -> Vec<BatchOutcome> {
        let total = locations.len();
        let groups = partition(locations, self.group_size);
        let group_count = groups.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, group) in groups.into_iter().enumerate() {
            let start = Instant::now();
            let size = group.len();
            let results = join_all(group.into_iter().map(|location| async move {
                let result = self.generator.generate_diff(&location).await;
                if let Err(e) = &result {
                    warn!(location = %location, error = %e, "batch member failed");
                }
                BatchOutcome { location, result }
            }))
            .await;

            let failed = results.iter().filter(|o| !o.is_ok()).count();
            metrics::counter!(telemetry::BATCH_GROUPS_TOTAL).increment(1);
            info!(
                group = index + 1,
                groups = group_count,
                size,
                failed,
                duration_ms = start.elapsed().as_millis() as u64,
                "Generated batch"
            );
            outcomes.extend(results);
        }
        outcomes
    }
}

/// Split `items` into consecutive groups of at most `size`, keeping order.
pub fn partition<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut groups = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        groups.push(iter.by_ref().take(size).collect());
    }
    groups
}
