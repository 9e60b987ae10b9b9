//! Configuration structures and types for artifact-publisher
//!
//! This module provides type-safe configuration management with serde support.
//! Every section is optional in a file; accessors on [`PublishConfig`] resolve the
//! effective value with its default.

use crate::core::artifact::ArtifactKind;
use crate::core::retry::RetryOptions;
use crate::validation::Channel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default name of the local feed directory, searched in parent directories
pub const DEFAULT_LOCAL_FEED_DIR: &str = "LocalFeed";

/// Default per-push timeout
pub const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 20;

/// Default build step timeout
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 1800;

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishConfig {
    /// Schema version (required)
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Package format of the published artifacts (default: nuget)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_kind: Option<ArtifactKind>,

    /// Local feed settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_feed: Option<LocalFeedConfig>,

    /// Remote feed templates, each serving a set of channels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_feeds: Option<Vec<RemoteFeedConfig>>,

    /// Publish options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOptionsConfig>,

    /// Directories added to the build step PATH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_paths: Option<Vec<ToolPathConfig>>,

    /// Build step run between planning and pushing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
}

/// Local feed configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocalFeedConfig {
    /// Directory name searched upwards from the project path (default: "LocalFeed")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_name: Option<String>,

    /// Publish to the local feed when it is found (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Remote feed template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFeedConfig {
    /// Feed name, unique across the configuration
    pub name: String,

    /// Metadata index base URL (environment variable expansion supported)
    pub url: String,

    /// Upload endpoint (default: the index URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,

    /// Environment variable holding the feed secret; a remote feed without one is skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key_name: Option<String>,

    /// Channels routed to this feed
    #[serde(default)]
    pub channels: Vec<Channel>,

    /// Quality view promotion (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionConfig>,
}

impl RemoteFeedConfig {
    pub fn serves(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }
}

/// Promotion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromotionConfig {
    /// Batch promotion endpoint
    pub url: String,

    /// Restrict promotions to these views (default: every view of the package quality)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<Vec<String>>,
}

/// Publish options configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PublishOptionsConfig {
    /// Per-push timeout in seconds (default: 20)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_timeout_secs: Option<u64>,

    /// Continue even when no artifact must be published (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_no_artifacts_to_produce: Option<bool>,

    /// Force remote publishing on or off instead of asking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_to_remote: Option<bool>,

    /// Interactive mode (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive: Option<bool>,

    /// Retry policy of remote existence checks (default: single attempt)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existence_retry: Option<RetryOptions>,

    /// Retry policy of view promotions (default: single attempt)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_retry: Option<RetryOptions>,
}

/// Tool path entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolPathConfig {
    /// Directory path, the last component may contain `*` wildcards
    pub pattern: String,

    /// Re-resolve on every use instead of once at startup
    #[serde(default)]
    pub dynamic: bool,
}

/// Build step configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Executable to run (must be allow-listed)
    pub command: String,

    /// Arguments passed as-is, never through a shell
    #[serde(default)]
    pub args: Vec<String>,

    /// Timeout in seconds (default: 1800)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl BuildConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_BUILD_TIMEOUT_SECS))
    }
}

/// Default remote feed templates: one MyGet feed per remote channel
fn default_remote_feeds() -> Vec<RemoteFeedConfig> {
    [
        ("release", Channel::Release, "MYGET_RELEASE_API_KEY"),
        ("preview", Channel::Preview, "MYGET_PREVIEW_API_KEY"),
        ("ci", Channel::CI, "MYGET_CI_API_KEY"),
    ]
    .into_iter()
    .map(|(suffix, channel, secret)| RemoteFeedConfig {
        name: format!("myget-{}", suffix),
        url: format!(
            "https://www.myget.org/F/${{MYGET_ACCOUNT}}-{}/api/v3/flatcontainer",
            suffix
        ),
        push_url: Some(format!(
            "https://www.myget.org/F/${{MYGET_ACCOUNT}}-{}/api/v2/package",
            suffix
        )),
        secret_key_name: Some(secret.to_string()),
        channels: vec![channel],
        promotion: None,
    })
    .collect()
}

/// Default configuration values
impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            extends: None,
            artifact_kind: Some(ArtifactKind::NuGet),
            local_feed: Some(LocalFeedConfig {
                directory_name: Some(DEFAULT_LOCAL_FEED_DIR.to_string()),
                enabled: Some(true),
            }),
            remote_feeds: Some(default_remote_feeds()),
            publish: Some(PublishOptionsConfig::default()),
            tool_paths: None,
            build: None,
        }
    }
}

impl PublishConfig {
    /// An empty layer: every section unset, used for environment and CLI overrides
    pub fn layer() -> Self {
        Self {
            version: String::new(),
            extends: None,
            artifact_kind: None,
            local_feed: None,
            remote_feeds: None,
            publish: None,
            tool_paths: None,
            build: None,
        }
    }

    pub fn artifact_kind(&self) -> ArtifactKind {
        self.artifact_kind.unwrap_or_default()
    }

    pub fn local_feed_directory_name(&self) -> &str {
        self.local_feed
            .as_ref()
            .and_then(|l| l.directory_name.as_deref())
            .unwrap_or(DEFAULT_LOCAL_FEED_DIR)
    }

    pub fn local_feed_enabled(&self) -> bool {
        self.local_feed
            .as_ref()
            .and_then(|l| l.enabled)
            .unwrap_or(true)
    }

    pub fn remote_feeds(&self) -> &[RemoteFeedConfig] {
        self.remote_feeds.as_deref().unwrap_or_default()
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(
            self.publish
                .as_ref()
                .and_then(|p| p.push_timeout_secs)
                .unwrap_or(DEFAULT_PUSH_TIMEOUT_SECS),
        )
    }

    pub fn ignore_no_artifacts_to_produce(&self) -> bool {
        self.publish
            .as_ref()
            .and_then(|p| p.ignore_no_artifacts_to_produce)
            .unwrap_or(false)
    }

    pub fn push_to_remote(&self) -> Option<bool> {
        self.publish.as_ref().and_then(|p| p.push_to_remote)
    }

    pub fn interactive(&self) -> bool {
        self.publish
            .as_ref()
            .and_then(|p| p.interactive)
            .unwrap_or(true)
    }

    pub fn existence_retry(&self) -> RetryOptions {
        self.publish
            .as_ref()
            .and_then(|p| p.existence_retry.clone())
            .unwrap_or_default()
    }

    pub fn promotion_retry(&self) -> RetryOptions {
        self.publish
            .as_ref()
            .and_then(|p| p.promotion_retry.clone())
            .unwrap_or_default()
    }

    pub fn tool_paths(&self) -> &[ToolPathConfig] {
        self.tool_paths.as_deref().unwrap_or_default()
    }
}
