//! Publication planning
//!
//! The planner classifies the version, selects the target feeds, resolves the
//! artifacts and runs the existence checks. Its decision gates the build step: when
//! no feed misses anything, the run stops before building.

use crate::core::artifact::{ArtifactInstance, ArtifactResolver, ArtifactSet};
use crate::core::context::RunContext;
use crate::core::error::PublishError;
use crate::core::interaction::{InteractionMode, PUBLISH_DIRTY_REPO};
use crate::core::retry::RetryManager;
use crate::orchestration::existence_checker::{TargetFeed, check_feeds};
use crate::orchestration::feed_registry::FeedRegistry;
use crate::validation::{Channel, RepositoryVersionInfo, classify};
use tracing::{info, warn};

/// Outcome of the planning gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDecision {
    /// At least one feed misses an artifact, or continuation was forced
    Proceed,
    /// Every artifact is already everywhere: nothing to build nor push
    NothingToPublish,
}

/// The feeds of a run, their plans, and the global artifact set
pub struct ArtifactRepository {
    version: RepositoryVersionInfo,
    channel: Channel,
    artifacts: ArtifactSet,
    targets: Vec<TargetFeed>,
    ignore_no_artifacts_to_produce: bool,
}

impl ArtifactRepository {
    pub fn new(
        version: RepositoryVersionInfo,
        artifacts: ArtifactSet,
        targets: Vec<TargetFeed>,
        ignore_no_artifacts_to_produce: bool,
    ) -> Self {
        let channel = classify(&version);
        Self {
            version,
            channel,
            artifacts,
            targets,
            ignore_no_artifacts_to_produce,
        }
    }

    pub fn version(&self) -> &RepositoryVersionInfo {
        &self.version
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    pub fn targets(&self) -> &[TargetFeed] {
        &self.targets
    }

    pub fn ignore_no_artifacts_to_produce(&self) -> bool {
        self.ignore_no_artifacts_to_produce
    }

    /// (Re)compute every feed plan
    ///
    /// No feed is queried for an invalid version: every plan is left empty.
    pub async fn initialize_plans(&mut self, retry: &RetryManager) {
        if !self.version.is_valid {
            for target in &mut self.targets {
                target.clear_plan();
            }
            return;
        }
        check_feeds(&mut self.targets, &self.artifacts, retry).await;
    }

    /// Deduplicated union of the feed plans
    pub fn actual_artifacts_to_publish(&self) -> Vec<ArtifactInstance> {
        let mut union = ArtifactSet::new();
        for target in &self.targets {
            for (id, artifact) in &target.plan().artifacts_to_publish {
                union.entry(id.clone()).or_insert_with(|| artifact.clone());
            }
        }
        union.into_values().collect()
    }

    pub fn no_artifacts_to_produce(&self) -> bool {
        self.targets.iter().all(|t| t.plan().is_empty())
    }

    /// Whether the run stops before the build step
    pub fn should_stop(&self) -> bool {
        self.no_artifacts_to_produce() && !self.ignore_no_artifacts_to_produce
    }

    pub fn decision(&self) -> PlanDecision {
        if self.should_stop() {
            PlanDecision::NothingToPublish
        } else {
            PlanDecision::Proceed
        }
    }

    /// Per-feed summary printed before anything is pushed
    pub fn summary(&self) -> Vec<String> {
        if self.targets.is_empty() {
            return vec![format!("No target feed for channel '{}'.", self.channel)];
        }
        self.targets.iter().flat_map(|t| t.summary()).collect()
    }
}

/// Builds the [`ArtifactRepository`] of a run
pub struct PublicationPlanner<'a> {
    ctx: &'a RunContext,
}

impl<'a> PublicationPlanner<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Classify, select feeds, resolve artifacts, check existence
    ///
    /// An invalid version is a configuration error unless the operator chooses to
    /// continue, in which case every plan stays empty and the build still runs.
    pub async fn plan<S: AsRef<str>>(
        &self,
        version: RepositoryVersionInfo,
        projects: &[S],
        ignore_no_artifacts_to_produce: bool,
    ) -> Result<ArtifactRepository, PublishError> {
        let mut ignore =
            ignore_no_artifacts_to_produce || self.ctx.config.ignore_no_artifacts_to_produce();

        let channel = classify(&version);
        if channel == Channel::Invalid {
            if !self.confirm_invalid_version(&version).await? {
                return Err(PublishError::InvalidVersion {
                    version: version.normalized_version.clone(),
                });
            }
            warn!(version = %version.normalized_version, "publishing with an invalid version");
            ignore = true;
        }

        let feeds = FeedRegistry::new(self.ctx).select(channel).await?;
        let artifacts =
            ArtifactResolver::new(self.ctx.config.artifact_kind()).resolve(projects, &version)?;

        let targets = feeds.into_iter().map(TargetFeed::new).collect();
        let mut repository = ArtifactRepository::new(version, artifacts, targets, ignore);

        let retry = RetryManager::new(self.ctx.config.existence_retry());
        repository.initialize_plans(&retry).await;

        info!(
            %channel,
            artifacts = repository.artifacts().len(),
            to_publish = repository.actual_artifacts_to_publish().len(),
            "publication plan ready"
        );
        Ok(repository)
    }

    async fn confirm_invalid_version(
        &self,
        version: &RepositoryVersionInfo,
    ) -> Result<bool, PublishError> {
        if self.ctx.interaction_mode() == InteractionMode::NoInteraction {
            return Ok(false);
        }
        let answer = self
            .ctx
            .interaction
            .read_option(
                PUBLISH_DIRTY_REPO,
                &format!(
                    "Version '{}' is not valid: nothing can be published. Build anyway?",
                    version.normalized_version
                ),
                &['Y', 'N'],
            )
            .await?;
        Ok(answer == 'Y')
    }
}
