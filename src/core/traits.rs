//! Core traits and types for artifact publishing
//!
//! This module defines the feed capability interface, the build step seam, and the
//! result types reported by the publisher.

use crate::core::artifact::ArtifactInstance;
use crate::core::error::PublishError;
use crate::feeds::ViewPromoter;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// Feeds
// ============================================================================

/// Static description of a destination feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub name: String,
    /// Metadata index URL for remote feeds, directory for local feeds
    pub url_or_path: String,
    pub is_local: bool,
    /// Environment variable holding the feed secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key_name: Option<String>,
}

/// Capability interface of a destination feed
///
/// Implementations are long-lived for the whole run and hold no plan state: the
/// plan of a feed is owned by its [`TargetFeed`](crate::orchestration::TargetFeed).
#[async_trait]
pub trait ArtifactFeed: Send + Sync {
    fn descriptor(&self) -> &FeedDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Check whether this exact artifact id and version already exists in the feed
    async fn exists(&self, artifact: &ArtifactInstance) -> Result<bool, PublishError>;

    /// Push an artifact file found in `artifacts_dir`
    async fn push(
        &self,
        artifact: &ArtifactInstance,
        artifacts_dir: &Path,
        credential: Option<&SecretString>,
    ) -> Result<(), PublishError>;

    /// Quality view promotion, for feeds that support it
    fn promoter(&self) -> Option<&ViewPromoter> {
        None
    }
}

// ============================================================================
// Build step
// ============================================================================

/// Produces the artifact files between planning and pushing
#[async_trait]
pub trait ArtifactProducer: Send + Sync {
    fn name(&self) -> &str;

    /// Make every artifact file available in `artifacts_dir`
    async fn produce(
        &self,
        artifacts: &[ArtifactInstance],
        artifacts_dir: &Path,
    ) -> Result<(), PublishError>;
}

// ============================================================================
// Push results
// ============================================================================

/// Final state of a feed after the push phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FeedPushStatus {
    /// Every planned artifact was pushed
    Pushed,
    /// The plan of this feed was empty
    NothingToPush,
    /// The push was not attempted (e.g. missing credential)
    Skipped { reason: String },
    /// A push failed; the remaining artifacts of this feed were not pushed
    Failed { error: String },
}

impl FeedPushStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, FeedPushStatus::Failed { .. })
    }
}

impl fmt::Display for FeedPushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedPushStatus::Pushed => f.write_str("pushed"),
            FeedPushStatus::NothingToPush => f.write_str("nothing to push"),
            FeedPushStatus::Skipped { reason } => write!(f, "skipped ({})", reason),
            FeedPushStatus::Failed { error } => write!(f, "failed ({})", error),
        }
    }
}

/// Result of one promotion call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionResult {
    pub artifact: String,
    pub view: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Push report of one feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPushReport {
    pub feed: String,
    pub status: FeedPushStatus,
    /// Artifacts pushed before the feed completed or failed
    pub pushed: Vec<ArtifactInstance>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub promotions: Vec<PromotionResult>,
}

impl FeedPushReport {
    pub fn new(feed: impl Into<String>, status: FeedPushStatus) -> Self {
        Self {
            feed: feed.into(),
            status,
            pushed: Vec::new(),
            promotions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_status_failure() {
        assert!(
            FeedPushStatus::Failed {
                error: "HTTP 409".to_string()
            }
            .is_failure()
        );
        assert!(
            !FeedPushStatus::Skipped {
                reason: "no credential".to_string()
            }
            .is_failure()
        );
        assert!(!FeedPushStatus::Pushed.is_failure());
    }

    #[test]
    fn test_push_status_serialization() {
        let status = FeedPushStatus::Skipped {
            reason: "missing MYGET_CI_API_KEY".to_string(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"status":"skipped","reason":"missing MYGET_CI_API_KEY"}"#);
    }

    #[test]
    fn test_report_serialization_skips_empty_promotions() {
        let report = FeedPushReport::new("ci", FeedPushStatus::Pushed);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("promotions").is_none());
        assert_eq!(json["feed"], "ci");
    }
}
