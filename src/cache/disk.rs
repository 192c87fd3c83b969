//! Durable patch storage: one `diff-{key}.patch` file per cache key.
//!
//! Writes go to a hidden temporary file in the same directory and are
//! renamed into place, so a concurrent reader sees either no file or the
//! complete patch. Temporary names never parse as cache keys, which keeps
//! in-progress writes out of [`PatchStore::list_keys`].

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::types::CacheKey;
use crate::{Result, ScaffdiffError};

/// Storage for generated patches.
///
/// Entries are write-once: a present entry is treated as permanently valid.
#[async_trait]
pub trait PatchStore: Send + Sync {
    /// Whether a complete entry exists for `key`. Does not read content.
    async fn has(&self, key: &CacheKey) -> bool;

    /// Read the patch for `key`, or [`ScaffdiffError::NotFound`].
    async fn read(&self, key: &CacheKey) -> Result<String>;

    /// Persist `patch` under `key`. A no-op if the entry already exists.
    async fn write(&self, key: &CacheKey, patch: &str) -> Result<()>;

    /// Keys of all fully written entries.
    async fn list_keys(&self) -> Result<HashSet<CacheKey>>;
}

/// Distinguishes temporary files written by concurrent tasks of one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// [`PatchStore`] backed by a directory of patch files.
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    /// Open (and create if absent) the store rooted at `root`.
    ///
    /// Fails with [`ScaffdiffError::Io`] naming the directory when it
    /// cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to create cache dir {}: {e}", root.display()),
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path of the patch file for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn tmp_path_for(&self, key: &CacheKey) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}-{n}.tmp",
            key.file_name(),
            std::process::id()
        ))
    }
}

#[async_trait]
impl PatchStore for DiskCacheStore {
    async fn has(&self, key: &CacheKey) -> bool {
        let path = self.path_for(key);
        match tokio::fs::try_exists(&path).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "cannot check cache entry, treating as absent"
                );
                false
            }
        }
    }

    async fn read(&self, key: &CacheKey) -> Result<String> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(patch) => Ok(patch),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ScaffdiffError::NotFound(key.file_name()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &CacheKey, patch: &str) -> Result<()> {
        let path = self.path_for(key);
        if self.has(key).await {
            debug!(key = %key, "cache entry already present, keeping it");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let tmp_path = self.tmp_path_for(key);
        if let Err(e) = tokio::fs::write(&tmp_path, patch).await {
            discard(&tmp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            discard(&tmp_path).await;
            return Err(e.into());
        }

        debug!(key = %key, path = %path.display(), bytes = patch.len(), "wrote cache entry");
        Ok(())
    }

    async fn list_keys(&self) -> Result<HashSet<CacheKey>> {
        let mut keys = HashSet::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            if let Some(key) = entry.file_name().to_str().and_then(CacheKey::from_file_name) {
                keys.insert(key);
            }
        }
        Ok(keys)
    }
}

async fn discard(tmp_path: &Path) {
    match tokio::fs::remove_file(tmp_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %tmp_path.display(), error = %e, "failed to remove temporary patch file")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiffLocation, FeatureSet};

    fn key() -> CacheKey {
        DiffLocation::parse("7.0.0", "7.5.0", FeatureSet::empty())
            .unwrap()
            .cache_key()
    }

    #[test]
    fn open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("diffs");
        let store = DiskCacheStore::open(&root).unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn open_reports_io_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let err = DiskCacheStore::open(blocker.join("diffs")).unwrap_err();

        assert!(matches!(err, ScaffdiffError::Io(_)), "got {err:?}");
        assert!(err.to_string().contains("not-a-dir"));
    }

    #[tokio::test]
    async fn unreadable_parent_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        // A root whose parent is a regular file makes every lookup fail.
        let store = DiskCacheStore {
            root: blocker.join("diffs"),
        };

        assert!(!store.has(&key()).await);
        assert!(store.write(&key(), "patch").await.is_err());
    }

    #[test]
    fn tmp_names_are_unique_and_unlisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path()).unwrap();
        let a = store.tmp_path_for(&key());
        let b = store.tmp_path_for(&key());
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(CacheKey::from_file_name(name).is_none());
    }

    #[tokio::test]
    async fn write_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path()).unwrap();
        store.write(&key(), "diff --git a/x b/x\n").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["diff-7.0.0-7.5.0.patch".to_string()]);
    }
}
