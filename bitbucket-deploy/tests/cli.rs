use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

fn create_config(repository: &str) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        format!("repository: \"{repository}\"\nbranch: master\n"),
    )
    .expect("Writing temp config failed");
    config
}

#[test]
fn sync_cli_fails_for_missing_config_file() {
    let mut cmd = Command::cargo_bin("bitbucket-deploy").expect("Binary exists");

    cmd.arg("sync")
        .arg("--config")
        .arg("does/not/exist.yaml")
        .env("BITBUCKET_USER", "deployer")
        .env("BITBUCKET_PASSWORD", "app-password");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

/// An invalid repository reference is rejected before any request is made.
#[test]
fn sync_cli_rejects_invalid_repository_reference() {
    let config = create_config("acme/tenant-config");
    let mut cmd = Command::cargo_bin("bitbucket-deploy").expect("Binary exists");

    cmd.arg("sync")
        .arg("--config")
        .arg(config.path())
        .arg("--repository")
        .arg("not a repository")
        .env("BITBUCKET_USER", "deployer")
        .env("BITBUCKET_PASSWORD", "app-password");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid repository reference"));
}

#[test]
fn sync_cli_requires_config_argument() {
    let mut cmd = Command::cargo_bin("bitbucket-deploy").expect("Binary exists");

    cmd.arg("sync");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--config"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use bitbucket_deploy::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Sync {
            config: std::path::PathBuf::from("dummy.yaml"),
            repository: None,
            branch: None,
            revision: None,
            output: None,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "dummy.yaml does not exist");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
