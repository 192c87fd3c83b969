//! Remote patch repository: fetch published patches, publish new ones.
//!
//! Patches are mirrored into a git repository under `diffs/{file_name}`.
//! Reads go over HTTP against a raw-content host
//! (`{raw_base_url}/diffs/{file_name}`); writes commit the file into a
//! local clone and push it.
//!
//! The remote is a secondary source. A fetch miss is normal, and a failed
//! publish never fails the generation that produced the patch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::{GitConfig, RemoteConfig};
use crate::types::DiffLocation;
use crate::{Result, ScaffdiffError};

/// Directory inside the remote repository that holds patch files.
pub const REMOTE_DIFFS_DIR: &str = "diffs";

/// Commit message used when publishing patches.
const PUBLISH_COMMIT_MESSAGE: &str = "Update diffs";

/// Secondary patch source and sink.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a published patch, or [`ScaffdiffError::NotFound`].
    async fn fetch(&self, location: &DiffLocation) -> Result<String>;

    /// Publish a patch. Callers treat failures as best-effort.
    async fn publish(&self, location: &DiffLocation, patch: &str) -> Result<()>;
}

/// [`RemoteStore`] over a raw-content HTTP host and a local git clone.
pub struct GitRemoteStore {
    client: reqwest::Client,
    raw_base_url: String,
    checkout: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
    git: GitConfig,
    // Commits in one clone must not interleave.
    publish_lock: Mutex<()>,
}

impl GitRemoteStore {
    pub fn new(
        raw_base_url: impl Into<String>,
        checkout: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        git: GitConfig,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(crate::version::user_agent())
                .build()
                .unwrap_or_default(),
            raw_base_url: raw_base_url.into(),
            checkout,
            runner,
            git,
            publish_lock: Mutex::new(()),
        }
    }

    pub fn from_config(
        config: &RemoteConfig,
        runner: Arc<dyn CommandRunner>,
        git: GitConfig,
    ) -> Self {
        Self::new(&config.raw_base_url, config.checkout.clone(), runner, git)
    }

    /// Raw-content URL of the patch for `location`.
    pub fn url_for(&self, location: &DiffLocation) -> String {
        format!(
            "{}/{REMOTE_DIFFS_DIR}/{}",
            self.raw_base_url.trim_end_matches('/'),
            location.cache_key().file_name()
        )
    }

    fn checkout(&self) -> Result<&Path> {
        self.checkout.as_deref().ok_or_else(|| {
            ScaffdiffError::Configuration("remote checkout is not configured".to_string())
        })
    }

    fn git_command(&self, checkout: &Path, args: &[&str]) -> CommandSpec {
        CommandSpec::new(&self.git.program)
            .arg("-c")
            .arg(format!("user.name={}", self.git.author_name))
            .arg("-c")
            .arg(format!("user.email={}", self.git.author_email))
            .args(args.iter().copied())
            .current_dir(checkout)
    }
}

#[async_trait]
impl RemoteStore for GitRemoteStore {
    async fn fetch(&self, location: &DiffLocation) -> Result<String> {
        let url = self.url_for(location);
        debug!(%url, "fetching remote patch");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ScaffdiffError::Network(format!("failed to fetch {url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ScaffdiffError::NotFound(url));
        }
        if !status.is_success() {
            return Err(ScaffdiffError::Network(format!(
                "remote patch fetch returned HTTP {status}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ScaffdiffError::Network(format!("failed to read patch body: {e}")))
    }

    async fn publish(&self, location: &DiffLocation, patch: &str) -> Result<()> {
        let file_name = location.cache_key().file_name();
        let relative = format!("{REMOTE_DIFFS_DIR}/{file_name}");

        let checkout = self.checkout()?;
        let _guard = self.publish_lock.lock().await;

        let dir = checkout.join(REMOTE_DIFFS_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), patch).await?;

        self.runner
            .run(&self.git_command(checkout, &["add", relative.as_str()]))
            .await?;
        self.runner
            .run(&self.git_command(
                checkout,
                &["commit", "--quiet", "--no-verify", "-m", PUBLISH_COMMIT_MESSAGE],
            ))
            .await?;
        self.runner
            .run(&self.git_command(checkout, &["push", "--quiet"]))
            .await?;

        info!(location = %location, "published patch to remote");
        Ok(())
    }
}
