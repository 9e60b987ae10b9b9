//! End-to-end publication runs against a local feed directory and mock remote feeds

use artifact_publisher::{
    ArtifactInstance, ArtifactProducer, Channel, ConsoleInteraction, CredentialStore,
    FeedPushStatus, InteractionMode, Orchestrator, PromotionConfig, PublicationPlanner,
    PublishConfig, PublishError, PublishOptionsConfig, RemoteFeedConfig, RepositoryVersionInfo,
    RunContext, RunOutcome, RunRequest,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes every requested artifact file
#[derive(Default)]
struct FakeBuild {
    calls: AtomicUsize,
}

#[async_trait]
impl ArtifactProducer for FakeBuild {
    fn name(&self) -> &str {
        "fake"
    }

    async fn produce(
        &self,
        artifacts: &[ArtifactInstance],
        artifacts_dir: &Path,
    ) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(artifacts_dir).unwrap();
        for artifact in artifacts {
            std::fs::write(artifact.path_in(artifacts_dir), b"package").unwrap();
        }
        Ok(())
    }
}

fn remote_feed(server: &MockServer, name: &str, channel: Channel, key: &str) -> RemoteFeedConfig {
    RemoteFeedConfig {
        name: name.to_string(),
        url: format!("{}/{}/flatcontainer", server.uri(), name),
        push_url: Some(format!("{}/{}/package", server.uri(), name)),
        secret_key_name: Some(key.to_string()),
        channels: vec![channel],
        promotion: None,
    }
}

fn standard_feeds(server: &MockServer) -> Vec<RemoteFeedConfig> {
    vec![
        remote_feed(server, "release", Channel::Release, "RELEASE_API_KEY"),
        remote_feed(server, "preview", Channel::Preview, "PREVIEW_API_KEY"),
        remote_feed(server, "ci", Channel::CI, "CI_API_KEY"),
    ]
}

fn config(remote_feeds: Vec<RemoteFeedConfig>) -> PublishConfig {
    let mut config = PublishConfig::default();
    config.remote_feeds = Some(remote_feeds);
    config.publish = Some(PublishOptionsConfig {
        push_to_remote: Some(true),
        push_timeout_secs: Some(5),
        ..Default::default()
    });
    config
}

fn all_secrets() -> Vec<(&'static str, &'static str)> {
    vec![
        ("RELEASE_API_KEY", "release-key"),
        ("PREVIEW_API_KEY", "preview-key"),
        ("CI_API_KEY", "ci-key"),
    ]
}

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("LocalFeed")).unwrap();
    temp
}

fn context(temp: &TempDir, config: PublishConfig, secrets: &[(&str, &str)]) -> RunContext {
    let env: HashMap<String, String> = secrets
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    RunContext::new(
        config,
        temp.path(),
        Arc::new(ConsoleInteraction::new(InteractionMode::NoInteraction)),
    )
    .unwrap()
    .with_credentials(CredentialStore::new(env))
    .with_artifacts_dir(temp.path().join("artifacts"))
}

fn request(version: &str, projects: &[&str]) -> RunRequest {
    RunRequest {
        version: RepositoryVersionInfo::parse(version),
        projects: projects.iter().map(|p| p.to_string()).collect(),
        ignore_no_artifacts_to_produce: false,
        plan_only: false,
    }
}

async fn mount_absent(server: &MockServer, feed: &str, package: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/flatcontainer/{}/index.json", feed, package)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

async fn mount_present(server: &MockServer, feed: &str, package: &str, version: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/flatcontainer/{}/index.json", feed, package)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "versions": [version] })))
        .mount(server)
        .await;
}

fn feed_names(outcome: &RunOutcome) -> Vec<&str> {
    outcome.reports().iter().map(|r| r.feed.as_str()).collect()
}

#[tokio::test]
async fn release_version_pushes_to_local_and_release_feed() {
    let server = MockServer::start().await;
    mount_absent(&server, "release", "pkg-a").await;
    Mock::given(method("PUT"))
        .and(path("/release/package"))
        .and(header("X-NuGet-ApiKey", "release-key"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let temp = workspace();
    let ctx = context(&temp, config(standard_feeds(&server)), &all_secrets());
    let build = FakeBuild::default();

    let outcome = Orchestrator::new(&ctx, &build)
        .run(request("1.2.3", &["pkg-a"]))
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Published { .. }));
    assert_eq!(feed_names(&outcome), vec!["Release", "release"]);
    assert!(outcome.reports().iter().all(|r| r.status == FeedPushStatus::Pushed));
    assert!(temp.path().join("LocalFeed/Release/pkg-a.1.2.3.nupkg").is_file());
}

#[tokio::test]
async fn ci_version_targets_only_ci_feeds() {
    let server = MockServer::start().await;
    mount_absent(&server, "ci", "pkg-a").await;
    Mock::given(method("PUT"))
        .and(path("/ci/package"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/release/package"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let temp = workspace();
    let ctx = context(&temp, config(standard_feeds(&server)), &all_secrets());

    let outcome = Orchestrator::new(&ctx, &FakeBuild::default())
        .run(request("1.2.3-ci.5", &["pkg-a"]))
        .await
        .unwrap();

    assert_eq!(feed_names(&outcome), vec!["CI", "ci"]);
    assert!(temp.path().join("LocalFeed/CI/pkg-a.1.2.3-ci.5.nupkg").is_file());
}

#[tokio::test]
async fn local_version_never_reaches_remote_feeds() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // every template claims every remote channel, remote publishing is forced on
    let mut feeds = standard_feeds(&server);
    for feed in &mut feeds {
        feed.channels = vec![Channel::Release, Channel::Preview, Channel::CI];
    }
    let temp = workspace();
    let ctx = context(&temp, config(feeds), &all_secrets());

    let outcome = Orchestrator::new(&ctx, &FakeBuild::default())
        .run(request("0.0.0-0.local", &["pkg-a"]))
        .await
        .unwrap();

    assert_eq!(feed_names(&outcome), vec!["Local"]);
    assert!(temp.path().join("LocalFeed/Local/pkg-a.0.0.0-0.local.nupkg").is_file());
}

#[tokio::test]
async fn remote_copy_is_excluded_from_remote_plan_only() {
    let server = MockServer::start().await;
    mount_absent(&server, "release", "pkg-a").await;
    mount_present(&server, "release", "pkg-b", "1.2.3").await;

    let temp = workspace();
    let ctx = context(&temp, config(standard_feeds(&server)), &all_secrets());

    let repository = PublicationPlanner::new(&ctx)
        .plan(RepositoryVersionInfo::parse("1.2.3"), &["pkg-a", "pkg-b"], false)
        .await
        .unwrap();

    let local = &repository.targets()[0];
    let remote = &repository.targets()[1];
    assert_eq!(local.name(), "Release");
    assert!(local.plan().artifacts_to_publish.contains_key("pkg-b"));
    assert_eq!(local.plan().artifacts_to_publish.len(), 2);

    assert_eq!(remote.name(), "release");
    assert!(!remote.plan().artifacts_to_publish.contains_key("pkg-b"));
    assert!(remote.plan().artifacts_to_publish.contains_key("pkg-a"));
    assert_eq!(remote.plan().already_published, vec!["pkg-b"]);
}

#[tokio::test]
async fn everything_published_skips_build_unless_forced() {
    let server = MockServer::start().await;
    mount_present(&server, "release", "pkg-a", "1.2.3").await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let temp = workspace();
    std::fs::create_dir_all(temp.path().join("LocalFeed/Release")).unwrap();
    std::fs::write(temp.path().join("LocalFeed/Release/pkg-a.1.2.3.nupkg"), b"package").unwrap();
    let ctx = context(&temp, config(standard_feeds(&server)), &all_secrets());
    let build = FakeBuild::default();

    let outcome = Orchestrator::new(&ctx, &build)
        .run(request("1.2.3", &["pkg-a"]))
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::NothingToPublish));
    assert_eq!(build.calls.load(Ordering::SeqCst), 0);

    let mut forced = request("1.2.3", &["pkg-a"]);
    forced.ignore_no_artifacts_to_produce = true;
    let outcome = Orchestrator::new(&ctx, &build).run(forced).await.unwrap();

    assert_eq!(build.calls.load(Ordering::SeqCst), 1);
    assert!(
        outcome
            .reports()
            .iter()
            .all(|r| r.status == FeedPushStatus::NothingToPush)
    );
}

#[tokio::test]
async fn missing_credential_skips_feed_without_failing_run() {
    let server = MockServer::start().await;
    mount_absent(&server, "release", "pkg-a").await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let temp = workspace();
    let ctx = context(&temp, config(standard_feeds(&server)), &[("CI_API_KEY", "ci-key")]);

    let outcome = Orchestrator::new(&ctx, &FakeBuild::default())
        .run(request("1.2.3", &["pkg-a"]))
        .await
        .unwrap();

    assert!(outcome.is_success());
    let reports = outcome.reports();
    assert_eq!(reports[0].status, FeedPushStatus::Pushed);
    assert!(matches!(reports[1].status, FeedPushStatus::Skipped { .. }));
}

#[tokio::test]
async fn remote_feed_without_secret_key_name_is_skipped() {
    let server = MockServer::start().await;
    mount_absent(&server, "release", "pkg-a").await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut feeds = standard_feeds(&server);
    feeds[0].secret_key_name = None;
    let temp = workspace();
    let ctx = context(&temp, config(feeds), &all_secrets());

    let outcome = Orchestrator::new(&ctx, &FakeBuild::default())
        .run(request("1.2.3", &["pkg-a"]))
        .await
        .unwrap();

    assert!(outcome.is_success());
    let reports = outcome.reports();
    assert_eq!(feed_names(&outcome), vec!["Release", "release"]);
    assert_eq!(reports[0].status, FeedPushStatus::Pushed);
    match &reports[1].status {
        FeedPushStatus::Skipped { reason } => assert!(reason.contains("could not be resolved")),
        other => panic!("unexpected status {:?}", other),
    }
    assert!(reports[1].pushed.is_empty());
}

#[tokio::test]
async fn push_failure_is_isolated_to_its_feed() {
    let server = MockServer::start().await;
    let mut feeds = standard_feeds(&server);
    feeds.push(remote_feed(&server, "ci-mirror", Channel::CI, "CI_API_KEY"));

    for feed in ["ci", "ci-mirror"] {
        for package in ["pkg-a", "pkg-b"] {
            mount_absent(&server, feed, package).await;
        }
    }
    Mock::given(method("PUT"))
        .and(path("/ci/package"))
        .respond_with(ResponseTemplate::new(409).set_body_string("Conflict"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ci-mirror/package"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    let temp = workspace();
    let ctx = context(&temp, config(feeds), &all_secrets());

    let outcome = Orchestrator::new(&ctx, &FakeBuild::default())
        .run(request("1.2.3-ci.9", &["pkg-a", "pkg-b"]))
        .await
        .unwrap();

    assert!(!outcome.is_success());
    let reports = outcome.reports();
    assert_eq!(feed_names(&outcome), vec!["CI", "ci", "ci-mirror"]);
    assert_eq!(reports[0].status, FeedPushStatus::Pushed);
    match &reports[1].status {
        FeedPushStatus::Failed { error } => assert!(error.contains("409")),
        other => panic!("unexpected status {:?}", other),
    }
    assert!(reports[1].pushed.is_empty());
    assert_eq!(reports[2].status, FeedPushStatus::Pushed);
    assert_eq!(reports[2].pushed.len(), 2);
}

#[tokio::test]
async fn promotion_failure_does_not_fail_the_run() {
    let server = MockServer::start().await;
    let mut feeds = standard_feeds(&server);
    feeds[0].promotion = Some(PromotionConfig {
        url: format!("{}/release/promote", server.uri()),
        views: Some(vec!["Stable".to_string()]),
    });

    mount_absent(&server, "release", "pkg-a").await;
    Mock::given(method("PUT"))
        .and(path("/release/package"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/release/promote"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let temp = workspace();
    let ctx = context(&temp, config(feeds), &all_secrets());

    let outcome = Orchestrator::new(&ctx, &FakeBuild::default())
        .run(request("1.2.3", &["pkg-a"]))
        .await
        .unwrap();

    assert!(outcome.is_success());
    let release = &outcome.reports()[1];
    assert_eq!(release.status, FeedPushStatus::Pushed);
    assert_eq!(release.promotions.len(), 1);
    assert_eq!(release.promotions[0].view, "Stable");
    assert!(!release.promotions[0].success);
}

#[tokio::test]
async fn invalid_version_is_a_configuration_error() {
    let temp = workspace();
    let ctx = context(&temp, config(Vec::new()), &[]);

    let result = Orchestrator::new(&ctx, &FakeBuild::default())
        .run(RunRequest {
            version: RepositoryVersionInfo::parse("not-a-version"),
            projects: vec!["pkg-a".to_string()],
            ignore_no_artifacts_to_produce: false,
            plan_only: false,
        })
        .await;

    let error = result.err().unwrap();
    assert!(error.is_fatal());
    assert_eq!(error.code(), "INVALID_VERSION");
}

#[tokio::test]
async fn auto_interaction_continues_invalid_version_without_pushing() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp = workspace();
    let ctx = RunContext::new(
        config(standard_feeds(&server)),
        temp.path(),
        Arc::new(ConsoleInteraction::new(InteractionMode::AutoInteraction)),
    )
    .unwrap()
    .with_credentials(CredentialStore::new(HashMap::new()))
    .with_artifacts_dir(temp.path().join("artifacts"));
    let build = FakeBuild::default();

    let outcome = Orchestrator::new(&ctx, &build)
        .run(request("not-a-version", &["pkg-a"]))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert!(outcome.reports().is_empty());
    assert_eq!(build.calls.load(Ordering::SeqCst), 1);
}
