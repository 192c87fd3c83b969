//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag, must exist)
//! 2. `./scaffdiff.toml` (project)
//! 3. `~/.scaffdiff/config.toml` (user)
//! 4. built-in defaults
//!
//! Secrets are loaded separately:
//! 1. `WEBHOOK_SECRET` environment variable
//! 2. `~/.scaffdiff/secrets.toml` (must be 0600 or 0400)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::Version;
use crate::{Result, ScaffdiffError};

/// Batch group width used when none is configured.
pub const DEFAULT_GROUP_SIZE: usize = 20;

/// Environment variable holding the webhook shared secret.
const WEBHOOK_SECRET_ENV: &str = "WEBHOOK_SECRET";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub versions: VersionsConfig,
}

/// Patch cache locations and sizes.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Directory holding `diff-*.patch` files (default: `diffs`).
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// In-memory tier capacity; 0 disables it (default: 256).
    #[serde(default = "default_memory_entries")]
    pub memory_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            memory_entries: default_memory_entries(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("diffs")
}

fn default_memory_entries() -> u64 {
    256
}

/// Where request-scoped working trees are materialised.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Parent directory of working trees (default: `.scaffdiff-work`).
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".scaffdiff-work")
}

/// How the project generator is invoked.
///
/// The final command line is
/// `{program} {program_args..} {package}@{version} {destination} {extra_args..} {feature flags..}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    /// Launcher executable (default: `npx`).
    #[serde(default = "default_generator_program")]
    pub program: String,
    /// Arguments for the launcher itself (default: `--yes`).
    #[serde(default = "default_generator_program_args")]
    pub program_args: Vec<String>,
    /// Generator package name (default: `create-t3-app`).
    #[serde(default = "default_generator_package")]
    pub package: String,
    /// Flags that keep the generator non-interactive and side-effect free.
    #[serde(default = "default_generator_extra_args")]
    pub extra_args: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: default_generator_program(),
            program_args: default_generator_program_args(),
            package: default_generator_package(),
            extra_args: default_generator_extra_args(),
        }
    }
}

fn default_generator_program() -> String {
    "npx".to_string()
}

fn default_generator_program_args() -> Vec<String> {
    vec!["--yes".to_string()]
}

fn default_generator_package() -> String {
    "create-t3-app".to_string()
}

fn default_generator_extra_args() -> Vec<String> {
    ["--CI", "--noGit", "--noInstall"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Git binary and the identity used for baseline commits.
#[derive(Debug, Clone, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_git_program")]
    pub program: String,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_git_program(),
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

fn default_git_program() -> String {
    "git".to_string()
}

fn default_author_name() -> String {
    "scaffdiff".to_string()
}

fn default_author_email() -> String {
    "scaffdiff@localhost".to_string()
}

/// Limits applied to every external command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandsConfig {
    /// Per-command timeout in seconds; absent means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl CommandsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Batch backfill settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Generations run concurrently per group (default: 20).
    #[serde(default = "default_group_size")]
    pub group_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
        }
    }
}

fn default_group_size() -> usize {
    DEFAULT_GROUP_SIZE
}

/// Remote patch repository.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL serving raw repository files; patches live under `diffs/`.
    pub raw_base_url: String,
    /// Local clone used to publish new patches.
    #[serde(default)]
    pub checkout: Option<PathBuf>,
    /// Push newly generated patches to the remote (default: false).
    #[serde(default)]
    pub publish: bool,
}

/// Upstream versions known to the backfill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionsConfig {
    #[serde(default)]
    pub known: Vec<String>,
}

impl VersionsConfig {
    /// Parse every configured version, failing on the first malformed one.
    pub fn parsed(&self) -> Result<Vec<Version>> {
        self.known
            .iter()
            .map(|v| {
                v.parse().map_err(|_| {
                    ScaffdiffError::Configuration(format!("invalid version '{v}' in [versions]"))
                })
            })
            .collect()
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Falls back to defaults when no file is found, except that an
    /// explicit path must exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from one file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScaffdiffError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ScaffdiffError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(ScaffdiffError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        let project_config = PathBuf::from("scaffdiff.toml");
        if project_config.exists() {
            return Ok(Some(project_config));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".scaffdiff").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        Ok(None)
    }
}

/// Secrets configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Secrets {
    /// Load secrets, preferring the environment over the secrets file.
    ///
    /// Returns empty secrets if neither source is present.
    pub fn load() -> Result<Self> {
        if let Ok(secret) = std::env::var(WEBHOOK_SECRET_ENV) {
            return Ok(Secrets {
                webhook_secret: Some(secret),
            });
        }

        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".scaffdiff").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        Ok(Secrets::default())
    }

    /// Load secrets from one file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            ScaffdiffError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ScaffdiffError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            ScaffdiffError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(ScaffdiffError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The webhook secret, or a configuration error if none is set.
    pub fn require_webhook_secret(&self) -> Result<&str> {
        self.webhook_secret.as_deref().ok_or_else(|| {
            ScaffdiffError::Configuration(format!(
                "no webhook secret configured; set {WEBHOOK_SECRET_ENV} or ~/.scaffdiff/secrets.toml"
            ))
        })
    }
}
