//! Patch extraction through a throwaway git history.
//!
//! Both trees are routed through one repository: `before` is committed as
//! a baseline, `after` is mirrored over it, and the staged diff against the
//! baseline is the patch. Git's rename/add/delete detection and hunk
//! output are reused as-is.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::command::{CommandRunner, CommandSpec};
use crate::config::GitConfig;
use crate::{Result, ScaffdiffError};

/// Version-control metadata directory, never mirrored.
const VCS_DIR: &str = ".git";

/// Computes a unified diff between two populated project directories.
pub struct DiffEngine {
    runner: Arc<dyn CommandRunner>,
    git: GitConfig,
}

impl DiffEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, git: GitConfig) -> Self {
        Self { runner, git }
    }

    /// Produce the patch that turns `before` into `after`.
    ///
    /// `before` is modified in place (it ends up holding a git repository
    /// with `after`'s content staged); `after` is only read. Any step
    /// failure is reported as [`ScaffdiffError::DiffGeneration`].
    pub async fn diff(&self, before: &Path, after: &Path) -> Result<String> {
        self.step(before, "init", &["init", "--quiet"]).await?;
        self.step(before, "stage baseline", &["add", "--all"]).await?;
        self.step(
            before,
            "commit baseline",
            &[
                "commit",
                "--quiet",
                "--allow-empty",
                "--no-gpg-sign",
                "--no-verify",
                "-m",
                "baseline",
            ],
        )
        .await?;

        let (src, dst) = (after.to_path_buf(), before.to_path_buf());
        let stats = tokio::task::spawn_blocking(move || mirror_tree(&src, &dst))
            .await
            .map_err(|e| ScaffdiffError::DiffGeneration(format!("mirror task failed: {e}")))?
            .map_err(|e| ScaffdiffError::DiffGeneration(format!("mirror: {e}")))?;
        debug!(copied = stats.copied, removed = stats.removed, "mirrored upgrade tree");

        self.step(before, "stage upgrade", &["add", "--all"]).await?;
        self.step(
            before,
            "diff",
            &["diff", "--staged", "--no-color", "--no-ext-diff"],
        )
        .await
    }

    /// Git invocation inside `dir` with a fixed committer identity.
    pub fn git_command(&self, dir: &Path, args: &[&str]) -> CommandSpec {
        CommandSpec::new(&self.git.program)
            .arg("-c")
            .arg(format!("user.name={}", self.git.author_name))
            .arg("-c")
            .arg(format!("user.email={}", self.git.author_email))
            .args(args.iter().copied())
            .current_dir(dir)
    }

    async fn step(&self, dir: &Path, name: &str, args: &[&str]) -> Result<String> {
        self.runner
            .run(&self.git_command(dir, args))
            .await
            .map_err(|e| ScaffdiffError::DiffGeneration(format!("{name}: {e}")))
    }
}

/// Counts from one [`mirror_tree`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorStats {
    pub copied: usize,
    pub removed: usize,
}

/// Make `dst` an exact copy of `src`, leaving any `.git` directory alone.
///
/// Entries in `dst` that are missing from `src`, or whose kind differs
/// (file vs directory vs symlink), are deleted before copying so nothing
/// from the old tree lingers.
pub fn mirror_tree(src: &Path, dst: &Path) -> io::Result<MirrorStats> {
    let mut stats = MirrorStats::default();

    let mut stale: Vec<PathBuf> = Vec::new();
    for entry in walk(dst) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(dst).map_err(io::Error::other)?;
        let counterpart = src.join(rel);
        let keep = match fs::symlink_metadata(&counterpart) {
            Ok(meta) => same_kind(&meta.file_type(), &entry.file_type()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e),
        };
        if !keep {
            stale.push(entry.path().to_path_buf());
        }
    }
    // Parents sort before their children; skip anything already gone.
    stale.sort();
    for path in stale {
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        stats.removed += 1;
    }

    fs::create_dir_all(dst)?;
    for entry in walk(src) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(rel);
        let kind = entry.file_type();
        if kind.is_dir() {
            fs::create_dir_all(&target)?;
        } else if kind.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            stats.copied += 1;
        } else {
            fs::copy(entry.path(), &target)?;
            stats.copied += 1;
        }
    }

    Ok(stats)
}

fn walk(root: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != VCS_DIR)
}

fn same_kind(a: &fs::FileType, b: &fs::FileType) -> bool {
    a.is_dir() == b.is_dir() && a.is_symlink() == b.is_symlink()
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let pointee = fs::read_link(link)?;
    match fs::symlink_metadata(target) {
        Ok(_) => fs::remove_file(target)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::os::unix::fs::symlink(pointee, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn mirror_copies_and_overwrites() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(src.path(), "package.json", "{\"v\":2}");
        write(src.path(), "src/env.mjs", "new");
        write(dst.path(), "package.json", "{\"v\":1}");

        let stats = mirror_tree(src.path(), dst.path()).unwrap();

        assert_eq!(stats.copied, 2);
        assert_eq!(
            fs::read_to_string(dst.path().join("package.json")).unwrap(),
            "{\"v\":2}"
        );
        assert_eq!(fs::read_to_string(dst.path().join("src/env.mjs")).unwrap(), "new");
    }

    #[test]
    fn mirror_deletes_files_missing_from_source() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(src.path(), "keep.txt", "k");
        write(dst.path(), "keep.txt", "k");
        write(dst.path(), "old/nested/gone.txt", "g");
        write(dst.path(), "gone.txt", "g");

        let stats = mirror_tree(src.path(), dst.path()).unwrap();

        assert!(dst.path().join("keep.txt").exists());
        assert!(!dst.path().join("gone.txt").exists());
        assert!(!dst.path().join("old").exists());
        // `old` is removed as a whole; its children are not counted separately.
        assert_eq!(stats.removed, 2);
    }

    #[test]
    fn mirror_preserves_destination_git_dir() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(src.path(), "a.txt", "a");
        write(dst.path(), ".git/HEAD", "ref: refs/heads/main");

        mirror_tree(src.path(), dst.path()).unwrap();

        assert!(dst.path().join(".git/HEAD").exists());
    }

    #[test]
    fn mirror_skips_source_git_dir() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(src.path(), ".git/config", "[core]");
        write(src.path(), "a.txt", "a");

        mirror_tree(src.path(), dst.path()).unwrap();

        assert!(!dst.path().join(".git").exists());
    }

    #[test]
    fn mirror_replaces_file_with_directory() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(src.path(), "config/index.ts", "export {}");
        write(dst.path(), "config", "was a file");

        mirror_tree(src.path(), dst.path()).unwrap();

        assert!(dst.path().join("config").is_dir());
        assert!(dst.path().join("config/index.ts").exists());
    }

    #[test]
    fn git_command_sets_identity_and_dir() {
        struct Never;
        #[async_trait::async_trait]
        impl CommandRunner for Never {
            async fn run(&self, _: &CommandSpec) -> Result<String> {
                unreachable!()
            }
        }
        let engine = DiffEngine::new(Arc::new(Never), GitConfig::default());
        let command = engine.git_command(Path::new("/w/current"), &["add", "--all"]);
        assert_eq!(command.program, "git");
        assert_eq!(
            command.args,
            vec![
                "-c",
                "user.name=scaffdiff",
                "-c",
                "user.email=scaffdiff@localhost",
                "add",
                "--all"
            ]
        );
        assert_eq!(command.working_dir.as_deref(), Some(Path::new("/w/current")));
    }
}
