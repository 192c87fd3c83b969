//! [`DiffEngine`] against a real `git` binary.
//!
//! Skipped (passes trivially) when git is not installed.

use std::path::Path;
use std::sync::Arc;

use scaffdiff::config::GitConfig;
use scaffdiff::{DiffEngine, ProcessRunner, ScaffdiffError};

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn engine() -> DiffEngine {
    DiffEngine::new(Arc::new(ProcessRunner::new()), GitConfig::default())
}

#[tokio::test]
async fn diff_reports_added_changed_and_removed_files() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let before = dir.path().join("current");
    let after = dir.path().join("upgrade");
    write(&before, "package.json", "{\"version\":\"7.0.0\"}\n");
    write(&before, "src/old.ts", "export const old = 1;\n");
    write(&after, "package.json", "{\"version\":\"7.5.0\"}\n");
    write(&after, "src/new.ts", "export const fresh = 1;\n");

    let patch = engine().diff(&before, &after).await.unwrap();

    assert!(patch.contains("diff --git a/package.json b/package.json"));
    assert!(patch.contains("-{\"version\":\"7.0.0\"}"));
    assert!(patch.contains("+{\"version\":\"7.5.0\"}"));
    assert!(patch.contains("b/src/new.ts"));
    assert!(patch.contains("a/src/old.ts"));
    assert!(patch.contains("deleted file mode"));
    // Upgrade tree is only read.
    assert!(!after.join(".git").exists());
}

#[tokio::test]
async fn identical_trees_give_empty_patch() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let before = dir.path().join("current");
    let after = dir.path().join("upgrade");
    write(&before, "README.md", "same\n");
    write(&after, "README.md", "same\n");

    let patch = engine().diff(&before, &after).await.unwrap();
    assert_eq!(patch, "");
}

#[tokio::test]
async fn missing_before_dir_is_diff_generation_error() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let err = engine()
        .diff(&dir.path().join("nope"), &dir.path().join("also-nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScaffdiffError::DiffGeneration(_)), "got {err:?}");
}
