//! Quality view promotion
//!
//! Feeds with views expose a package version in every view up to its quality: a CI
//! build is only visible in `@CI`, a stable release in every view. After a successful
//! push, each artifact is promoted once per view.

use crate::core::artifact::ArtifactInstance;
use crate::core::error::PublishError;
use crate::core::retry::{RetryManager, RetryOptions};
use crate::core::traits::PromotionResult;
use crate::validation::PackageQuality;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{error, info};

/// Promotion operation code of the batch endpoint
const PROMOTE_OPERATION: u32 = 0;

#[derive(Debug, Serialize)]
struct PromotionRequest<'a> {
    data: PromotionData<'a>,
    operation: u32,
    packages: Vec<PromotedPackage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PromotionData<'a> {
    view_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PromotedPackage<'a> {
    id: &'a str,
    version: &'a str,
    protocol_type: &'a str,
}

#[derive(Debug, Clone)]
pub struct ViewPromoter {
    client: reqwest::Client,
    url: String,
    views: Option<Vec<String>>,
    retry: RetryManager,
}

impl ViewPromoter {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            views: None,
            retry: RetryManager::new(RetryOptions::default()),
        }
    }

    /// Only promote into these views
    pub fn with_views(mut self, views: Vec<String>) -> Self {
        self.views = Some(views);
        self
    }

    pub fn with_retry(mut self, options: RetryOptions) -> Self {
        self.retry = RetryManager::new(options);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Views an artifact is promoted into, derived from its own version
    pub fn views_for(&self, artifact: &ArtifactInstance) -> Vec<String> {
        PackageQuality::of(&artifact.version)
            .view_labels()
            .into_iter()
            .filter(|label| {
                self.views
                    .as_ref()
                    .is_none_or(|allowed| allowed.iter().any(|v| v.eq_ignore_ascii_case(label)))
            })
            .map(str::to_string)
            .collect()
    }

    /// Promote every artifact into its views, sequentially
    ///
    /// Failures are logged and reported, they never stop the remaining promotions.
    pub async fn promote_all(
        &self,
        feed: &str,
        artifacts: &[ArtifactInstance],
        secret: &SecretString,
    ) -> Vec<PromotionResult> {
        let mut results = Vec::new();

        for artifact in artifacts {
            for view in self.views_for(artifact) {
                let outcome = self
                    .retry
                    .retry(|| self.promote(feed, artifact, &view, secret))
                    .await;

                let result = match outcome {
                    Ok(()) => {
                        info!(feed, artifact = %artifact, view = %view, "promoted");
                        PromotionResult {
                            artifact: artifact.to_string(),
                            view,
                            success: true,
                            error: None,
                        }
                    }
                    Err(e) => {
                        error!(feed, artifact = %artifact, view = %view, error = %e, "promotion failed");
                        PromotionResult {
                            artifact: artifact.to_string(),
                            view,
                            success: false,
                            error: Some(e.to_string()),
                        }
                    }
                };
                results.push(result);
            }
        }

        results
    }

    /// Promote one artifact into one view
    pub async fn promote(
        &self,
        feed: &str,
        artifact: &ArtifactInstance,
        view: &str,
        secret: &SecretString,
    ) -> Result<(), PublishError> {
        let body = PromotionRequest {
            data: PromotionData { view_id: view },
            operation: PROMOTE_OPERATION,
            packages: vec![PromotedPackage {
                id: &artifact.name,
                version: &artifact.version,
                protocol_type: artifact.kind.protocol_type(),
            }],
        };

        let failure = |message: String| PublishError::PromotionFailed {
            feed: feed.to_string(),
            artifact: artifact.to_string(),
            view: view.to_string(),
            message,
        };

        let response = self
            .client
            .post(&self.url)
            .basic_auth("", Some(secret.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failure(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}
