//! Builder for configuring pipeline instances

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::local::{DiffPipeline, PipelineInner};
use crate::cache::{DiskCacheStore, InFlight, PatchMemory, PatchStore};
use crate::command::{CommandRunner, ProcessRunner};
use crate::config::{Config, GeneratorConfig, GitConfig, RemoteConfig, WorkspaceConfig};
use crate::generate::{DiffEngine, Scaffolder};
use crate::remote::{GitRemoteStore, RemoteStore};
use crate::{Result, ScaffdiffError};

/// Main entry point for creating pipeline instances.
pub struct Scaffdiff;

impl Scaffdiff {
    /// Create a new builder for configuring the pipeline.
    pub fn builder() -> ScaffdiffBuilder {
        ScaffdiffBuilder::new()
    }
}

/// Builder for configuring pipeline instances.
pub struct ScaffdiffBuilder {
    cache_dir: Option<PathBuf>,
    store: Option<Arc<dyn PatchStore>>,
    workspace_root: PathBuf,
    runner: Option<Arc<dyn CommandRunner>>,
    command_timeout: Option<Duration>,
    generator: GeneratorConfig,
    git: GitConfig,
    memory_entries: u64,
    remote: Option<Arc<dyn RemoteStore>>,
    remote_config: Option<RemoteConfig>,
    publish: bool,
}

impl ScaffdiffBuilder {
    pub fn new() -> Self {
        Self {
            cache_dir: None,
            store: None,
            workspace_root: WorkspaceConfig::default().root,
            runner: None,
            command_timeout: None,
            generator: GeneratorConfig::default(),
            git: GitConfig::default(),
            memory_entries: 0,
            remote: None,
            remote_config: None,
            publish: false,
        }
    }

    /// Seed every setting from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new()
            .cache_dir(&config.cache.dir)
            .workspace_root(&config.workspace.root)
            .generator(config.generator.clone())
            .git(config.git.clone())
            .memory_entries(config.cache.memory_entries);
        builder.command_timeout = config.commands.timeout();
        if let Some(remote) = &config.remote {
            builder.publish = remote.publish;
            builder.remote_config = Some(remote.clone());
        }
        builder
    }

    /// Directory for the on-disk patch store.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Use a custom durable store instead of a [`DiskCacheStore`].
    pub fn store(mut self, store: Arc<dyn PatchStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Parent directory for request-scoped working trees.
    pub fn workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_root = path.into();
        self
    }

    /// Run external commands through `runner` (default: [`ProcessRunner`]).
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Kill generator and git processes that run longer than `timeout`.
    ///
    /// Ignored when a custom runner is supplied.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    pub fn git(mut self, git: GitConfig) -> Self {
        self.git = git;
        self
    }

    /// Capacity of the in-memory tier; 0 disables it.
    pub fn memory_entries(mut self, entries: u64) -> Self {
        self.memory_entries = entries;
        self
    }

    /// Consult `remote` after a disk miss.
    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Publish freshly generated patches to the remote (default: off).
    pub fn publish(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> Result<DiffPipeline> {
        let store: Arc<dyn PatchStore> = match (self.store, self.cache_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(DiskCacheStore::open(dir)?),
            (None, None) => {
                return Err(ScaffdiffError::Configuration(
                    "a cache directory or patch store is required".to_string(),
                ));
            }
        };

        let runner = self.runner.unwrap_or_else(|| {
            Arc::new(ProcessRunner::with_timeout(self.command_timeout)) as Arc<dyn CommandRunner>
        });

        let remote = match (self.remote, self.remote_config) {
            (Some(remote), _) => Some(remote),
            (None, Some(config)) => Some(Arc::new(GitRemoteStore::from_config(
                &config,
                Arc::clone(&runner),
                self.git.clone(),
            )) as Arc<dyn RemoteStore>),
            (None, None) => None,
        };

        let memory = (self.memory_entries > 0).then(|| PatchMemory::new(self.memory_entries));

        let inner = PipelineInner {
            store,
            remote,
            publish: self.publish,
            scaffolder: Scaffolder::new(Arc::clone(&runner), self.generator),
            engine: DiffEngine::new(runner, self.git),
            workspace_root: self.workspace_root,
        };

        Ok(DiffPipeline {
            inner: Arc::new(inner),
            memory,
            inflight: InFlight::new(),
        })
    }
}

impl Default for ScaffdiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}
