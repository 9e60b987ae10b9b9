//! Error handling for artifact publishing
//!
//! Every failure the engine can observe is a variant of [`PublishError`]. Feed-scoped
//! variants carry the feed name so that the orchestrator can downgrade them locally
//! (skip a feed, fall back to "must publish", log a promotion failure) while the
//! configuration variants escalate to the top-level run result.

use thiserror::Error;

/// Main error type for publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors (fatal, raised before any push)
    #[error("Repository version is not valid: {version}")]
    InvalidVersion { version: String },

    #[error("Required directory not found: {path}")]
    MissingDirectory { path: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Artifact file not found: {path}")]
    MissingArtifact { path: String },

    // Credential errors
    #[error("[{feed}] Secret {key} could not be resolved")]
    CredentialMissing { feed: String, key: String },

    // Existence check errors
    #[error("[{feed}] Unable to check that {artifact} exists: {message}")]
    ExistenceCheckFailed {
        feed: String,
        artifact: String,
        message: String,
    },

    // Push errors
    #[error("[{feed}] Push of {artifact} failed: {message}")]
    PushFailed {
        feed: String,
        artifact: String,
        message: String,
    },

    #[error("[{feed}] Push of {artifact} timed out after {seconds}s")]
    PushTimeout {
        feed: String,
        artifact: String,
        seconds: u64,
    },

    // Promotion errors
    #[error("[{feed}] Promotion of {artifact} to view '@{view}' failed: {message}")]
    PromotionFailed {
        feed: String,
        artifact: String,
        view: String,
        message: String,
    },

    // Transport errors
    #[error("[{feed}] Network error: {message}")]
    Network { feed: String, message: String },

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Build step failed: {0}")]
    BuildFailed(String),
}

impl PublishError {
    /// Get the feed name associated with this error, if any
    pub fn feed(&self) -> Option<&str> {
        match self {
            Self::CredentialMissing { feed, .. }
            | Self::ExistenceCheckFailed { feed, .. }
            | Self::PushFailed { feed, .. }
            | Self::PushTimeout { feed, .. }
            | Self::PromotionFailed { feed, .. }
            | Self::Network { feed, .. } => Some(feed),
            Self::InvalidVersion { .. }
            | Self::MissingDirectory { .. }
            | Self::ConfigError(_)
            | Self::MissingArtifact { .. }
            | Self::Io { .. }
            | Self::BuildFailed(_) => None,
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Only configuration errors are fatal: feed-scoped failures are handled by the
    /// feed that raised them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidVersion { .. }
                | Self::MissingDirectory { .. }
                | Self::ConfigError(_)
                | Self::MissingArtifact { .. }
                | Self::BuildFailed(_)
        )
    }

    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::PushTimeout { .. } => true,
            Self::ExistenceCheckFailed { message, .. }
            | Self::PromotionFailed { message, .. }
            | Self::PushFailed { message, .. } => is_transient_message(message),
            _ => false,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidVersion { .. } => vec![
                "Commit or tag the repository so that a valid version can be computed",
                "Use --ignore-no-artifacts to run the build anyway",
            ],
            Self::MissingDirectory { .. } => vec!["Create the directory or fix the configured path"],
            Self::ConfigError(_) => vec!["Check .artifact-publisher.yaml"],
            Self::MissingArtifact { .. } => vec![
                "Run the build step before publishing",
                "Check the --artifacts-dir option",
            ],
            Self::CredentialMissing { .. } => vec![
                "Set the feed secret environment variable (e.g. MYGET_RELEASE_API_KEY)",
                "Run interactively to be prompted for the value",
            ],
            Self::ExistenceCheckFailed { .. } => vec![
                "The artifact is considered missing and will be pushed again",
                "Check the feed URL and network access",
            ],
            Self::PushFailed { .. } => vec![
                "Check the feed secret permissions",
                "Check the feed status and retry the run",
            ],
            Self::PushTimeout { .. } => vec![
                "Increase publish.pushTimeoutSecs",
                "Check network connectivity",
            ],
            Self::PromotionFailed { .. } => vec![
                "Promote the package manually in the feed UI",
                "Enable publish.promotionRetry",
            ],
            Self::Network { .. } => vec![
                "Check internet connectivity",
                "Wait a moment and retry",
            ],
            Self::Io { .. } => vec!["Check file permissions and free disk space"],
            Self::BuildFailed(_) => vec!["Check the build command output"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidVersion { .. } => "INVALID_VERSION",
            Self::MissingDirectory { .. } => "MISSING_DIRECTORY",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::MissingArtifact { .. } => "MISSING_ARTIFACT",
            Self::CredentialMissing { .. } => "CREDENTIAL_MISSING",
            Self::ExistenceCheckFailed { .. } => "EXISTENCE_CHECK_FAILED",
            Self::PushFailed { .. } => "PUSH_FAILED",
            Self::PushTimeout { .. } => "PUSH_TIMEOUT",
            Self::PromotionFailed { .. } => "PROMOTION_FAILED",
            Self::Network { .. } => "NETWORK_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::BuildFailed(_) => "BUILD_FAILED",
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl std::fmt::Display, err: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

fn is_transient_message(message: &str) -> bool {
    const PATTERNS: &[&str] = &[
        "timed out",
        "timeout",
        "connection refused",
        "connection reset",
        "error sending request",
        "503",
        "502",
        "429",
    ];
    let lower = message.to_lowercase();
    PATTERNS.iter().any(|p| lower.contains(p))
}
