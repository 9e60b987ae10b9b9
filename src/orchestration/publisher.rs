//! Push phase
//!
//! Credentials are resolved feed by feed before anything is pushed, so that operator
//! prompts never interleave. Feeds then push concurrently; within a feed, artifacts are
//! pushed one at a time and the first failure stops that feed only.

use crate::core::context::RunContext;
use crate::core::error::PublishError;
use crate::core::traits::{FeedPushReport, FeedPushStatus};
use crate::orchestration::existence_checker::TargetFeed;
use crate::orchestration::planner::ArtifactRepository;
use futures::future::join_all;
use secrecy::SecretString;
use std::time::Duration;
use tracing::{error, info, warn};

/// A feed ready to push
struct PushJob<'r> {
    target: &'r TargetFeed,
    credential: Option<SecretString>,
}

pub struct Publisher<'a> {
    ctx: &'a RunContext,
}

impl<'a> Publisher<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Push every feed plan of the repository
    ///
    /// Returns one report per target feed, in feed order.
    pub async fn publish(&self, repository: &ArtifactRepository) -> Vec<FeedPushReport> {
        let mut reports: Vec<Option<FeedPushReport>> = Vec::new();
        let mut jobs = Vec::new();

        for target in repository.targets() {
            if target.plan().is_empty() {
                reports.push(Some(FeedPushReport::new(
                    target.name(),
                    FeedPushStatus::NothingToPush,
                )));
                continue;
            }
            match self.resolve_credential(target).await {
                Ok(credential) => {
                    reports.push(None);
                    jobs.push(PushJob { target, credential });
                }
                Err(e) => {
                    let reason = self.masked(target, &e.to_string());
                    warn!(feed = %target.name(), code = e.code(), %reason, "push skipped");
                    reports.push(Some(FeedPushReport::new(
                        target.name(),
                        FeedPushStatus::Skipped { reason },
                    )));
                }
            }
        }

        let timeout = self.ctx.config.push_timeout();
        let mut pushed = join_all(jobs.iter().map(|job| self.push_feed(job, timeout)))
            .await
            .into_iter();

        reports
            .into_iter()
            .filter_map(|report| report.or_else(|| pushed.next()))
            .collect()
    }

    /// Secret of a feed; `Err` holds the reason the feed is skipped
    ///
    /// Local feeds need none. A remote feed without a secret name is treated like a
    /// remote feed whose secret is missing.
    async fn resolve_credential(
        &self,
        target: &TargetFeed,
    ) -> Result<Option<SecretString>, PublishError> {
        let descriptor = target.feed().descriptor();
        if descriptor.is_local {
            return Ok(None);
        }

        let key = descriptor
            .secret_key_name
            .as_deref()
            .filter(|k| !k.is_empty());
        let secret = match key {
            Some(key) => {
                self.ctx
                    .credentials
                    .resolve(key, self.ctx.interaction.as_ref())
                    .await?
            }
            None => None,
        };

        secret.map(Some).ok_or_else(|| {
            warn!(
                "Could not resolve API key. Push to '{}' => '{}' is skipped.",
                descriptor.name, descriptor.url_or_path
            );
            PublishError::CredentialMissing {
                feed: descriptor.name.clone(),
                key: key.unwrap_or("(no secretKeyName)").to_string(),
            }
        })
    }

    /// Error text with the feed secret masked
    fn masked(&self, target: &TargetFeed, text: &str) -> String {
        match &target.feed().descriptor().secret_key_name {
            Some(key) => self.ctx.credentials.mask_secrets_in(text, &[key.as_str()]),
            None => text.to_string(),
        }
    }

    async fn push_feed(&self, job: &PushJob<'_>, timeout: Duration) -> FeedPushReport {
        let target = job.target;
        let feed = target.feed();
        let mut report = FeedPushReport::new(target.name(), FeedPushStatus::Pushed);

        for artifact in target.plan().artifacts_to_publish.values() {
            let result = tokio::time::timeout(
                timeout,
                feed.push(artifact, self.ctx.artifacts_dir(), job.credential.as_ref()),
            )
            .await
            .unwrap_or_else(|_| {
                Err(PublishError::PushTimeout {
                    feed: target.name().to_string(),
                    artifact: artifact.to_string(),
                    seconds: timeout.as_secs(),
                })
            });

            match result {
                Ok(()) => {
                    info!(feed = %target.name(), artifact = %artifact, "pushed");
                    report.pushed.push(artifact.clone());
                }
                Err(e) => {
                    let message = self.masked(target, &e.to_string());
                    error!(feed = %target.name(), artifact = %artifact, error = %message, "push failed");
                    report.status = FeedPushStatus::Failed { error: message };
                    return report;
                }
            }
        }

        if let Some(promoter) = feed.promoter() {
            match &job.credential {
                Some(secret) => {
                    report.promotions = promoter
                        .promote_all(target.name(), &report.pushed, secret)
                        .await;
                    for promotion in &mut report.promotions {
                        promotion.error =
                            promotion.error.as_deref().map(|e| self.masked(target, e));
                    }
                }
                None => warn!(feed = %target.name(), "no feed secret, promotions skipped"),
            }
        }

        report
    }
}
