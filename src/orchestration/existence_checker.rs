//! Feed existence checks
//!
//! Each [`TargetFeed`] owns the plan of one feed and is the only writer of it. A
//! refresh issues one existence query per artifact concurrently, joins them, and then
//! replaces the previous plan as a whole.

use crate::core::artifact::{ArtifactInstance, ArtifactSet};
use crate::core::retry::RetryManager;
use crate::core::traits::ArtifactFeed;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a feed is missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPlan {
    pub artifacts_to_publish: ArtifactSet,
    /// Names of the artifacts the feed already holds, in artifact order
    pub already_published: Vec<String>,
}

impl FeedPlan {
    pub fn is_empty(&self) -> bool {
        self.artifacts_to_publish.is_empty()
    }
}

/// A destination feed and its plan
#[derive(Clone)]
pub struct TargetFeed {
    feed: Arc<dyn ArtifactFeed>,
    plan: FeedPlan,
}

impl TargetFeed {
    pub fn new(feed: Arc<dyn ArtifactFeed>) -> Self {
        Self {
            feed,
            plan: FeedPlan::default(),
        }
    }

    pub fn feed(&self) -> &Arc<dyn ArtifactFeed> {
        &self.feed
    }

    pub fn name(&self) -> &str {
        self.feed.name()
    }

    pub fn plan(&self) -> &FeedPlan {
        &self.plan
    }

    pub fn clear_plan(&mut self) {
        self.plan = FeedPlan::default();
    }

    /// Recompute the plan against `artifacts`
    ///
    /// A failed query counts as "missing": a redundant push is preferred over a
    /// missed publication.
    pub async fn refresh_plan(&mut self, artifacts: &ArtifactSet, retry: &RetryManager) {
        let feed = &self.feed;
        let checks = artifacts.values().map(|artifact| async move {
            let exists = check_exists(feed.as_ref(), artifact, retry).await;
            (artifact, exists)
        });
        let results = join_all(checks).await;

        let mut plan = FeedPlan::default();
        for (artifact, exists) in results {
            if exists {
                debug!(feed = %self.feed.name(), artifact = %artifact, "already published");
                plan.already_published.push(artifact.name.clone());
            } else {
                debug!(feed = %self.feed.name(), artifact = %artifact, "must be published");
                plan.artifacts_to_publish
                    .insert(artifact.name.clone(), artifact.clone());
            }
        }
        self.plan = plan;
    }

    /// Human-readable plan summary
    pub fn summary(&self) -> Vec<String> {
        let plan = &self.plan;
        let to_push = plan.artifacts_to_publish.len();
        let mut lines = Vec::new();

        if to_push == 0 {
            lines.push(format!(
                "Feed '{}': No packages must be pushed ({} packages already available).",
                self.name(),
                plan.already_published.len()
            ));
        } else if plan.already_published.is_empty() {
            lines.push(format!(
                "Feed '{}': All {} packages must be pushed.",
                self.name(),
                to_push
            ));
        } else {
            let names: Vec<&str> = plan.artifacts_to_publish.keys().map(String::as_str).collect();
            lines.push(format!(
                "Feed '{}': {} packages must be pushed: {}.",
                self.name(),
                to_push,
                names.join(", ")
            ));
            lines.push(format!(
                "                => {} packages already pushed: {}.",
                plan.already_published.len(),
                plan.already_published.join(", ")
            ));
        }
        lines
    }
}

async fn check_exists(
    feed: &dyn ArtifactFeed,
    artifact: &ArtifactInstance,
    retry: &RetryManager,
) -> bool {
    match retry.retry(|| feed.exists(artifact)).await {
        Ok(exists) => exists,
        Err(e) => {
            warn!(
                feed = %feed.name(),
                artifact = %artifact,
                error = %e,
                "existence check failed, the artifact will be pushed"
            );
            false
        }
    }
}

/// Refresh every feed plan; feeds proceed concurrently
pub async fn check_feeds(targets: &mut [TargetFeed], artifacts: &ArtifactSet, retry: &RetryManager) {
    join_all(
        targets
            .iter_mut()
            .map(|target| target.refresh_plan(artifacts, retry)),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::ArtifactKind;
    use crate::core::error::PublishError;
    use crate::core::retry::RetryOptions;
    use crate::core::traits::FeedDescriptor;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    /// In-memory feed; names listed in `broken` fail their existence check
    struct MemoryFeed {
        descriptor: FeedDescriptor,
        present: Mutex<HashSet<String>>,
        broken: HashSet<String>,
    }

    impl MemoryFeed {
        fn new(name: &str, present: &[&str], broken: &[&str]) -> Self {
            Self {
                descriptor: FeedDescriptor {
                    name: name.to_string(),
                    url_or_path: format!("memory://{}", name),
                    is_local: false,
                    secret_key_name: None,
                },
                present: Mutex::new(present.iter().map(|s| s.to_string()).collect()),
                broken: broken.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl ArtifactFeed for MemoryFeed {
        fn descriptor(&self) -> &FeedDescriptor {
            &self.descriptor
        }

        async fn exists(&self, artifact: &ArtifactInstance) -> Result<bool, PublishError> {
            if self.broken.contains(&artifact.name) {
                return Err(PublishError::ExistenceCheckFailed {
                    feed: self.descriptor.name.clone(),
                    artifact: artifact.to_string(),
                    message: "HTTP 500".to_string(),
                });
            }
            Ok(self.present.lock().unwrap().contains(&artifact.name))
        }

        async fn push(
            &self,
            artifact: &ArtifactInstance,
            _artifacts_dir: &Path,
            _credential: Option<&SecretString>,
        ) -> Result<(), PublishError> {
            self.present.lock().unwrap().insert(artifact.name.clone());
            Ok(())
        }
    }

    fn artifacts(names: &[&str]) -> ArtifactSet {
        names
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    ArtifactInstance::new(ArtifactKind::NuGet, *n, "1.0.0"),
                )
            })
            .collect()
    }

    fn no_retry() -> RetryManager {
        RetryManager::new(RetryOptions::default())
    }

    #[tokio::test]
    async fn test_refresh_plan() {
        let mut target = TargetFeed::new(Arc::new(MemoryFeed::new("ci", &["pkg-a"], &[])));
        target
            .refresh_plan(&artifacts(&["pkg-a", "pkg-b", "pkg-c"]), &no_retry())
            .await;

        assert_eq!(target.plan().already_published, vec!["pkg-a"]);
        let missing: Vec<&String> = target.plan().artifacts_to_publish.keys().collect();
        assert_eq!(missing, vec!["pkg-b", "pkg-c"]);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let all = artifacts(&["pkg-a", "pkg-b"]);
        let mut target = TargetFeed::new(Arc::new(MemoryFeed::new("ci", &["pkg-b"], &[])));

        target.refresh_plan(&all, &no_retry()).await;
        let first = target.plan().clone();
        target.refresh_plan(&all, &no_retry()).await;

        assert_eq!(target.plan(), &first);
        assert_eq!(target.plan().already_published.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_check_means_must_publish() {
        let mut target = TargetFeed::new(Arc::new(MemoryFeed::new(
            "ci",
            &["pkg-a", "pkg-b"],
            &["pkg-b"],
        )));
        target
            .refresh_plan(&artifacts(&["pkg-a", "pkg-b"]), &no_retry())
            .await;

        assert!(target.plan().artifacts_to_publish.contains_key("pkg-b"));
        assert_eq!(target.plan().already_published.len(), 1);
    }

    #[tokio::test]
    async fn test_plan_is_subset_of_artifacts() {
        let all = artifacts(&["pkg-a", "pkg-b", "pkg-c"]);
        let mut targets = vec![
            TargetFeed::new(Arc::new(MemoryFeed::new("one", &[], &["pkg-c"]))),
            TargetFeed::new(Arc::new(MemoryFeed::new("two", &["pkg-a"], &[]))),
        ];
        check_feeds(&mut targets, &all, &no_retry()).await;

        for target in &targets {
            for (id, artifact) in &target.plan().artifacts_to_publish {
                assert_eq!(all.get(id), Some(artifact));
            }
        }
        assert_eq!(targets[0].plan().artifacts_to_publish.len(), 3);
        assert_eq!(targets[1].plan().artifacts_to_publish.len(), 2);
    }

    #[tokio::test]
    async fn test_summary_lines() {
        let all = artifacts(&["pkg-a", "pkg-b"]);

        let mut none = TargetFeed::new(Arc::new(MemoryFeed::new("Release", &["pkg-a", "pkg-b"], &[])));
        none.refresh_plan(&all, &no_retry()).await;
        assert_eq!(
            none.summary(),
            vec!["Feed 'Release': No packages must be pushed (2 packages already available)."]
        );

        let mut every = TargetFeed::new(Arc::new(MemoryFeed::new("CI", &[], &[])));
        every.refresh_plan(&all, &no_retry()).await;
        assert_eq!(every.summary(), vec!["Feed 'CI': All 2 packages must be pushed."]);

        let mut partial = TargetFeed::new(Arc::new(MemoryFeed::new("ci", &["pkg-a"], &[])));
        partial.refresh_plan(&all, &no_retry()).await;
        let lines = partial.summary();
        assert_eq!(lines[0], "Feed 'ci': 1 packages must be pushed: pkg-b.");
        assert!(lines[1].ends_with("=> 1 packages already pushed: pkg-a."));

        let all = artifacts(&["pkg-a", "pkg-b", "pkg-c"]);
        let mut mirror = TargetFeed::new(Arc::new(MemoryFeed::new("mirror", &["pkg-a", "pkg-c"], &[])));
        mirror.refresh_plan(&all, &no_retry()).await;
        assert_eq!(
            mirror.summary()[1].trim_start(),
            "=> 2 packages already pushed: pkg-a, pkg-c."
        );
    }
}
