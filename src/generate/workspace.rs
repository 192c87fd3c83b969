//! Request-scoped working trees.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::scaffold::remove_dir_if_exists;
use crate::types::CacheKey;

/// The `current`/`upgrade` directory pair used by one generation.
///
/// Paths are a pure function of the cache key, so generations for distinct
/// keys never share a directory. The whole tree is deleted when the guard
/// is removed or dropped, whichever comes first, which covers early returns,
/// errors and cancelled futures alike.
#[derive(Debug)]
pub struct WorkingTree {
    root: PathBuf,
    before: PathBuf,
    after: PathBuf,
    removed: bool,
}

impl WorkingTree {
    pub fn for_key(workspace_root: &Path, key: &CacheKey) -> Self {
        let root = workspace_root.join(key.as_str());
        Self {
            before: root.join("current"),
            after: root.join("upgrade"),
            root,
            removed: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory scaffolded at the current version; becomes the git repository.
    pub fn before(&self) -> &Path {
        &self.before
    }

    /// Directory scaffolded at the upgrade version.
    pub fn after(&self) -> &Path {
        &self.after
    }

    /// Delete the tree now, without blocking the runtime.
    pub async fn remove(mut self) {
        match remove_dir_if_exists(&self.root).await {
            Ok(()) => debug!(root = %self.root.display(), "removed working tree"),
            Err(e) => warn!(root = %self.root.display(), error = %e, "failed to remove working tree"),
        }
        self.removed = true;
    }
}

impl Drop for WorkingTree {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(root = %self.root.display(), error = %e, "failed to remove working tree"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiffLocation, FeatureSet};

    fn key(current: &str) -> CacheKey {
        DiffLocation::parse(current, "7.5.0", FeatureSet::empty())
            .unwrap()
            .cache_key()
    }

    #[test]
    fn paths_derive_from_key() {
        let tree = WorkingTree::for_key(Path::new("/work"), &key("7.0.0"));
        assert_eq!(tree.before(), Path::new("/work/7.0.0-7.5.0/current"));
        assert_eq!(tree.after(), Path::new("/work/7.0.0-7.5.0/upgrade"));
    }

    #[test]
    fn distinct_keys_get_distinct_roots() {
        let a = WorkingTree::for_key(Path::new("/work"), &key("7.0.0"));
        let b = WorkingTree::for_key(Path::new("/work"), &key("7.1.0"));
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn drop_removes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = {
            let tree = WorkingTree::for_key(dir.path(), &key("7.0.0"));
            std::fs::create_dir_all(tree.before()).unwrap();
            std::fs::write(tree.before().join("file"), "x").unwrap();
            tree.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn remove_is_idempotent_with_drop() {
        let dir = tempfile::tempdir().unwrap();
        let tree = WorkingTree::for_key(dir.path(), &key("7.0.0"));
        let root = tree.root().to_path_buf();
        std::fs::create_dir_all(tree.after()).unwrap();
        tree.remove().await;
        assert!(!root.exists());
    }
}
