//! Integration tests for [`GitRemoteStore`]: HTTP fetch and git publish.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scaffdiff::config::GitConfig;
use scaffdiff::remote::{GitRemoteStore, RemoteStore};
use scaffdiff::{CommandRunner, CommandSpec, DiffLocation, Result, ScaffdiffError};

/// Runner that records git invocations without executing them.
#[derive(Default)]
struct RecordingRunner {
    commands: Mutex<Vec<CommandSpec>>,
    fail_push: bool,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> Result<String> {
        self.commands.lock().unwrap().push(command.clone());
        if self.fail_push && command.args.iter().any(|a| a == "push") {
            return Err(ScaffdiffError::Command {
                program: command.program.clone(),
                exit_code: 128,
                stderr: "rejected".to_string(),
            });
        }
        Ok(String::new())
    }
}

fn location() -> DiffLocation {
    DiffLocation::from_slug("7.0.0..7.5.0-tailwind").unwrap()
}

fn store(
    base_url: &str,
    checkout: Option<std::path::PathBuf>,
    runner: Arc<RecordingRunner>,
) -> GitRemoteStore {
    GitRemoteStore::new(base_url, checkout, runner, GitConfig::default())
}

// =============================================================================
// Fetch
// =============================================================================

#[tokio::test]
async fn fetch_returns_published_patch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/diffs/diff-7.0.0-7.5.0-tailwind.patch"))
        .respond_with(ResponseTemplate::new(200).set_body_string("diff --git a/x b/x\n"))
        .expect(1)
        .mount(&server)
        .await;

    let remote = store(&server.uri(), None, Arc::default());
    let patch = remote.fetch(&location()).await.unwrap();
    assert_eq!(patch, "diff --git a/x b/x\n");
}

#[tokio::test]
async fn fetch_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let remote = store(&server.uri(), None, Arc::default());
    let err = remote.fetch(&location()).await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn fetch_server_error_is_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let remote = store(&server.uri(), None, Arc::default());
    let err = remote.fetch(&location()).await.unwrap_err();
    assert!(matches!(err, ScaffdiffError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn fetch_unreachable_host_is_network() {
    // Port 1 on localhost refuses connections.
    let remote = store("http://127.0.0.1:1", None, Arc::default());
    let err = remote.fetch(&location()).await.unwrap_err();
    assert!(matches!(err, ScaffdiffError::Network(_)), "got {err:?}");
}

#[test]
fn url_tolerates_trailing_slash() {
    let remote = store("https://raw.example.com/repo/main/", None, Arc::default());
    assert_eq!(
        remote.url_for(&location()),
        "https://raw.example.com/repo/main/diffs/diff-7.0.0-7.5.0-tailwind.patch"
    );
}

// =============================================================================
// Publish
// =============================================================================

#[tokio::test]
async fn publish_writes_file_and_commits() {
    let checkout = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let remote = store(
        "http://unused",
        Some(checkout.path().to_path_buf()),
        runner.clone(),
    );

    remote.publish(&location(), "the patch").await.unwrap();

    let written = checkout
        .path()
        .join("diffs")
        .join("diff-7.0.0-7.5.0-tailwind.patch");
    assert_eq!(std::fs::read_to_string(written).unwrap(), "the patch");

    let commands = runner.commands.lock().unwrap();
    let subcommands: Vec<&str> = commands.iter().map(|c| c.args[4].as_str()).collect();
    assert_eq!(subcommands, vec!["add", "commit", "push"]);
    assert!(commands[0]
        .args
        .contains(&"diffs/diff-7.0.0-7.5.0-tailwind.patch".to_string()));
    assert!(commands[1].args.contains(&"Update diffs".to_string()));
    assert!(commands
        .iter()
        .all(|c| c.working_dir.as_deref() == Some(checkout.path())));
}

#[tokio::test]
async fn publish_without_checkout_is_configuration_error() {
    let runner = Arc::new(RecordingRunner::default());
    let remote = store("http://unused", None, runner.clone());

    let err = remote.publish(&location(), "p").await.unwrap_err();

    assert!(matches!(err, ScaffdiffError::Configuration(_)));
    assert!(runner.commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn publish_surfaces_push_failure() {
    let checkout = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner {
        fail_push: true,
        ..RecordingRunner::default()
    });
    let remote = store("http://unused", Some(checkout.path().to_path_buf()), runner);

    let err = remote.publish(&location(), "p").await.unwrap_err();
    assert!(err.is_command_failure());
}
