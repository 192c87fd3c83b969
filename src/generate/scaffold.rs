//! Project generator invocation.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::GeneratorConfig;
use crate::types::{FeatureSet, Version};
use crate::{Result, ScaffdiffError};

/// Runs the external generator to materialise one project version.
pub struct Scaffolder {
    runner: Arc<dyn CommandRunner>,
    config: GeneratorConfig,
}

impl Scaffolder {
    pub fn new(runner: Arc<dyn CommandRunner>, config: GeneratorConfig) -> Self {
        Self { runner, config }
    }

    /// Command line that generates `version` with `features` into `destination`.
    pub fn command_for(
        &self,
        version: Version,
        features: FeatureSet,
        destination: &Path,
    ) -> CommandSpec {
        CommandSpec::new(&self.config.program)
            .args(self.config.program_args.iter().cloned())
            .arg(format!("{}@{version}", self.config.package))
            .arg(destination.to_string_lossy())
            .args(self.config.extra_args.iter().cloned())
            .args(features.iter().map(|f| f.flag()))
    }

    /// Generate `version` into `destination`.
    ///
    /// Anything already at `destination` is deleted first so a stale
    /// scaffold from an interrupted run cannot leak into the diff. Partial
    /// output left by a failed run is the caller's to clean up.
    pub async fn scaffold(
        &self,
        version: Version,
        features: FeatureSet,
        destination: &Path,
    ) -> Result<()> {
        remove_dir_if_exists(destination).await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let command = self.command_for(version, features, destination);
        info!(%version, destination = %destination.display(), "scaffolding project");
        self.runner
            .run(&command)
            .await
            .map_err(|e| ScaffdiffError::Scaffold {
                version: version.to_string(),
                source: Box::new(e),
            })?;
        debug!(%version, "scaffold complete");
        Ok(())
    }
}

/// `rm -rf` that treats a missing directory as success.
pub(crate) async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
