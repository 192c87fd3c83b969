//! Local diff pipeline: cache tiers in front of scaffold + diff.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, info, warn};

use crate::cache::{InFlight, PatchMemory, PatchStore};
use crate::generate::{DiffEngine, Scaffolder, WorkingTree};
use crate::remote::RemoteStore;
use crate::telemetry;
use crate::traits::DiffGenerator;
use crate::types::{CacheKey, DiffLocation};
use crate::Result;

/// Produces patches for [`DiffLocation`]s, memoised by [`CacheKey`].
///
/// Lookup order: in-memory tier → disk store → remote store (if any) →
/// full generation. Concurrent misses for the same key share one
/// generation. A generated patch is written to the disk store before it is
/// returned; a failed generation writes nothing and leaves no working
/// tree behind.
pub struct DiffPipeline {
    pub(super) inner: Arc<PipelineInner>,
    pub(super) memory: Option<PatchMemory>,
    pub(super) inflight: InFlight,
}

/// State shared with spawned generations.
pub(super) struct PipelineInner {
    pub(super) store: Arc<dyn PatchStore>,
    pub(super) remote: Option<Arc<dyn RemoteStore>>,
    pub(super) publish: bool,
    pub(super) scaffolder: Scaffolder,
    pub(super) engine: DiffEngine,
    pub(super) workspace_root: PathBuf,
}

impl DiffPipeline {
    /// Return the patch for `location`, generating it on a cache miss.
    pub async fn generate_diff(&self, location: &DiffLocation) -> Result<Arc<str>> {
        let key = location.cache_key();

        if let Some(patch) = self.lookup_key(&key).await? {
            return Ok(patch);
        }

        let inner = Arc::clone(&self.inner);
        let owned_location = location.clone();
        let owned_key = key.clone();
        let patch = self
            .inflight
            .run(&key, move || {
                async move { inner.produce(&owned_location, &owned_key).await }.boxed()
            })
            .await?;

        self.remember(key, Arc::clone(&patch)).await;
        Ok(patch)
    }

    /// Parse a page slug and return its patch.
    pub async fn generate_diff_for_slug(&self, slug: &str) -> Result<Arc<str>> {
        let location = DiffLocation::from_slug(slug)?;
        self.generate_diff(&location).await
    }

    /// Cached patch for `location`, without generating anything.
    pub async fn lookup(&self, location: &DiffLocation) -> Result<Option<Arc<str>>> {
        self.lookup_key(&location.cache_key()).await
    }

    /// The durable store backing this pipeline.
    pub fn store(&self) -> Arc<dyn PatchStore> {
        Arc::clone(&self.inner.store)
    }

    /// Number of keys currently being generated.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    async fn lookup_key(&self, key: &CacheKey) -> Result<Option<Arc<str>>> {
        if let Some(memory) = &self.memory {
            if let Some(patch) = memory.get(key).await {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "memory").increment(1);
                return Ok(Some(patch));
            }
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "memory").increment(1);
        }

        match self.inner.read_disk(key).await? {
            Some(patch) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "disk").increment(1);
                self.remember(key.clone(), Arc::clone(&patch)).await;
                Ok(Some(patch))
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "disk").increment(1);
                Ok(None)
            }
        }
    }

    async fn remember(&self, key: CacheKey, patch: Arc<str>) {
        if let Some(memory) = &self.memory {
            memory.insert(key, patch).await;
        }
    }
}

impl PipelineInner {
    async fn read_disk(&self, key: &CacheKey) -> Result<Option<Arc<str>>> {
        if !self.store.has(key).await {
            return Ok(None);
        }
        match self.store.read(key).await {
            Ok(patch) => Ok(Some(Arc::from(patch))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Leader path for a missing key: remote, then full generation.
    async fn produce(&self, location: &DiffLocation, key: &CacheKey) -> Result<Arc<str>> {
        // An earlier leader or another process may have finished meanwhile.
        if let Some(patch) = self.read_disk(key).await? {
            debug!(key = %key, "entry appeared while waiting");
            return Ok(patch);
        }

        if let Some(remote) = &self.remote {
            match remote.fetch(location).await {
                Ok(patch) => {
                    metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "remote")
                        .increment(1);
                    self.store.write(key, &patch).await?;
                    return Ok(Arc::from(patch));
                }
                Err(e) if e.is_not_found() => {
                    metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "remote")
                        .increment(1);
                }
                Err(e) => warn!(key = %key, error = %e, "remote fetch failed, generating locally"),
            }
        }

        let patch = self.generate(location, key).await?;
        self.store.write(key, &patch).await?;
        let patch: Arc<str> = Arc::from(patch);

        if self.publish {
            if let Some(remote) = &self.remote {
                spawn_publish(Arc::clone(remote), location.clone(), Arc::clone(&patch));
            }
        }
        Ok(patch)
    }

    /// Scaffold both versions into a fresh working tree and diff them.
    async fn generate(&self, location: &DiffLocation, key: &CacheKey) -> Result<String> {
        let start = Instant::now();
        let tree = WorkingTree::for_key(&self.workspace_root, key);
        info!(location = %location, root = %tree.root().display(), "generating diff");

        let result = self.build_patch(location, &tree).await;
        tree.remove().await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::GENERATIONS_TOTAL, "status" => status).increment(1);
        metrics::histogram!(telemetry::GENERATION_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(patch) => info!(
                location = %location,
                bytes = patch.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "generated diff"
            ),
            Err(e) => warn!(location = %location, error = %e, "diff generation failed"),
        }
        result
    }

    async fn build_patch(&self, location: &DiffLocation, tree: &WorkingTree) -> Result<String> {
        let features = location.features();
        self.scaffolder
            .scaffold(location.current(), features, tree.before())
            .await?;
        self.scaffolder
            .scaffold(location.upgrade(), features, tree.after())
            .await?;
        self.engine.diff(tree.before(), tree.after()).await
    }
}

/// Push a new patch to the remote without holding up the caller.
fn spawn_publish(remote: Arc<dyn RemoteStore>, location: DiffLocation, patch: Arc<str>) {
    tokio::spawn(async move {
        match remote.publish(&location, &patch).await {
            Ok(()) => {
                metrics::counter!(telemetry::REMOTE_PUBLISH_TOTAL, "status" => "ok").increment(1);
            }
            Err(e) => {
                metrics::counter!(telemetry::REMOTE_PUBLISH_TOTAL, "status" => "error")
                    .increment(1);
                warn!(location = %location, error = %e, "failed to publish patch to remote");
            }
        }
    });
}

#[async_trait]
impl DiffGenerator for DiffPipeline {
    async fn generate_diff(&self, location: &DiffLocation) -> Result<Arc<str>> {
        DiffPipeline::generate_diff(self, location).await
    }
}
