//! Configuration file loader for artifact-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::PublishError;
use crate::core::retry::RetryOptions;
use crate::validation::Channel;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".artifact-publisher.yaml";

lazy_static! {
    /// Environment variable pattern (${VAR_NAME})
    static ref ENV_VAR_REGEX: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Home directory holding the global config, if any
    pub home_dir: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<PublishConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options for a project, reading the process environment
    pub fn for_project(project_path: impl Into<PathBuf>) -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        let home_dir = env.get("HOME").map(PathBuf::from);
        Self {
            project_path: project_path.into(),
            home_dir,
            cli_args: None,
            env,
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "remoteFeeds[0].url")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.artifact-publisher.yaml)
    /// 4. Global config (~/.artifact-publisher.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut configs: Vec<PublishConfig> = Vec::new();

        // 5. Default values (lowest priority)
        configs.push(PublishConfig::default());

        // 4. Global config
        if let Some(home_dir) = &options.home_dir
            && let Some(global_config) = Self::load_config_file(&home_dir.join(CONFIG_FILENAME)).await?
        {
            configs.push(global_config);
        }

        // 3. Project config
        if let Some(project_config) =
            Self::load_config_file(&options.project_path.join(CONFIG_FILENAME)).await?
        {
            configs.push(project_config);
        }

        // 2. Environment variables
        if let Some(env_config) = Self::load_env_config(&options.env)? {
            configs.push(env_config);
        }

        // 1. CLI arguments (highest priority)
        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);

        Ok(Self::expand_env_vars(merged_config, &options.env))
    }

    /// Load configuration from YAML file
    fn load_config_file(
        file_path: &Path,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<PublishConfig>, PublishError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            if !file_path.exists() {
                return Ok(None);
            }
            debug!(path = %file_path.display(), "loading configuration file");

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                PublishError::ConfigError(format!(
                    "Failed to read config file {}: {}",
                    file_path.display(),
                    e
                ))
            })?;

            let config: PublishConfig = serde_yaml::from_str(&content).map_err(|e| {
                PublishError::ConfigError(format!(
                    "Failed to parse YAML config {}: {}",
                    file_path.display(),
                    e
                ))
            })?;

            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| {
                        PublishError::ConfigError("Invalid config file path".to_string())
                    })?
                    .join(extends_path);

                if let Some(base_config) = Self::load_config_file(&base_path).await? {
                    let mut merged = base_config;
                    Self::merge_into(&mut merged, config);
                    return Ok(Some(merged));
                }
                warn!(path = %base_path.display(), "extended configuration file not found");
            }

            Ok(Some(config))
        })
    }

    /// Load configuration from environment variables
    fn load_env_config(
        env: &HashMap<String, String>,
    ) -> Result<Option<PublishConfig>, PublishError> {
        let mut publish = PublishOptionsConfig::default();
        let mut config = PublishConfig::layer();
        let mut has_changes = false;

        // PUBLISH_NON_INTERACTIVE -> publish.interactive
        if let Some(value) = env.get("PUBLISH_NON_INTERACTIVE") {
            publish.interactive = Some(!parse_bool("PUBLISH_NON_INTERACTIVE", value)?);
            has_changes = true;
        }

        // PUBLISH_PUSH_TIMEOUT -> publish.pushTimeoutSecs
        if let Some(value) = env.get("PUBLISH_PUSH_TIMEOUT") {
            let secs = value.trim().parse::<u64>().map_err(|_| {
                PublishError::ConfigError(format!(
                    "PUBLISH_PUSH_TIMEOUT must be a number of seconds, got '{}'",
                    value
                ))
            })?;
            publish.push_timeout_secs = Some(secs);
            has_changes = true;
        }

        // PUBLISH_IGNORE_NO_ARTIFACTS -> publish.ignoreNoArtifactsToProduce
        if let Some(value) = env.get("PUBLISH_IGNORE_NO_ARTIFACTS") {
            publish.ignore_no_artifacts_to_produce =
                Some(parse_bool("PUBLISH_IGNORE_NO_ARTIFACTS", value)?);
            has_changes = true;
        }

        // PUBLISH_LOCAL_FEED_DIR -> localFeed.directoryName
        if let Some(value) = env.get("PUBLISH_LOCAL_FEED_DIR") {
            config.local_feed = Some(LocalFeedConfig {
                directory_name: Some(value.clone()),
                enabled: None,
            });
            has_changes = true;
        }

        if publish != PublishOptionsConfig::default() {
            config.publish = Some(publish);
        }

        Ok(if has_changes { Some(config) } else { None })
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<PublishConfig>) -> PublishConfig {
        let mut result = PublishConfig::layer();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    pub fn merge_into(target: &mut PublishConfig, source: PublishConfig) {
        if !source.version.is_empty() {
            target.version = source.version;
        }

        if source.extends.is_some() {
            target.extends = source.extends;
        }

        if source.artifact_kind.is_some() {
            target.artifact_kind = source.artifact_kind;
        }

        if let Some(source_local) = source.local_feed {
            let target_local = target.local_feed.get_or_insert_with(LocalFeedConfig::default);
            if source_local.directory_name.is_some() {
                target_local.directory_name = source_local.directory_name;
            }
            if source_local.enabled.is_some() {
                target_local.enabled = source_local.enabled;
            }
        }

        // Feed templates are replaced as a whole
        if source.remote_feeds.is_some() {
            target.remote_feeds = source.remote_feeds;
        }

        if let Some(source_publish) = source.publish {
            let target_publish = target.publish.get_or_insert_with(PublishOptionsConfig::default);
            if source_publish.push_timeout_secs.is_some() {
                target_publish.push_timeout_secs = source_publish.push_timeout_secs;
            }
            if source_publish.ignore_no_artifacts_to_produce.is_some() {
                target_publish.ignore_no_artifacts_to_produce =
                    source_publish.ignore_no_artifacts_to_produce;
            }
            if source_publish.push_to_remote.is_some() {
                target_publish.push_to_remote = source_publish.push_to_remote;
            }
            if source_publish.interactive.is_some() {
                target_publish.interactive = source_publish.interactive;
            }
            if source_publish.existence_retry.is_some() {
                target_publish.existence_retry = source_publish.existence_retry;
            }
            if source_publish.promotion_retry.is_some() {
                target_publish.promotion_retry = source_publish.promotion_retry;
            }
        }

        if source.tool_paths.is_some() {
            target.tool_paths = source.tool_paths;
        }

        if source.build.is_some() {
            target.build = source.build;
        }
    }

    /// Expand environment variables in feed URLs
    ///
    /// Unknown variables are left in place; [`ConfigLoader::validate`] reports them.
    fn expand_env_vars(mut config: PublishConfig, env: &HashMap<String, String>) -> PublishConfig {
        if let Some(feeds) = &mut config.remote_feeds {
            for feed in feeds.iter_mut() {
                feed.url = Self::expand_string(&feed.url, env);
                if let Some(push_url) = &feed.push_url {
                    feed.push_url = Some(Self::expand_string(push_url, env));
                }
                if let Some(promotion) = &mut feed.promotion {
                    promotion.url = Self::expand_string(&promotion.url, env);
                }
            }
        }
        config
    }

    /// Expand environment variables in a single string
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        ENV_VAR_REGEX
            .replace_all(input, |cap: &regex::Captures| match env.get(&cap[1]) {
                Some(value) => value.clone(),
                None => {
                    debug!(variable = &cap[1], "environment variable not found");
                    cap[0].to_string()
                }
            })
            .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &PublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        // 2. Validate feed templates
        let remote_enabled = config.push_to_remote() != Some(false);
        Self::validate_remote_feeds(
            config.remote_feeds(),
            remote_enabled,
            &mut errors,
            &mut warnings,
        );

        // 3. Validate publish options
        if config.publish.as_ref().and_then(|p| p.push_timeout_secs) == Some(0) {
            errors.push(ConfigValidationError {
                field: "publish.pushTimeoutSecs".to_string(),
                message: "Push timeout must be greater than zero".to_string(),
            });
        }

        Self::validate_retry(
            "publish.existenceRetry",
            &config.existence_retry(),
            &mut errors,
        );
        Self::validate_retry(
            "publish.promotionRetry",
            &config.promotion_retry(),
            &mut errors,
        );

        // 4. Validate local feed and build step
        if config.local_feed_directory_name().trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "localFeed.directoryName".to_string(),
                message: "Local feed directory name must not be empty".to_string(),
            });
        }
        if let Some(build) = &config.build
            && build.command.trim().is_empty()
        {
            errors.push(ConfigValidationError {
                field: "build.command".to_string(),
                message: "Build command is required".to_string(),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_retry(field: &str, retry: &RetryOptions, errors: &mut Vec<ConfigValidationError>) {
        if retry.max_attempts < 1 {
            errors.push(ConfigValidationError {
                field: format!("{}.maxAttempts", field),
                message: "At least one attempt is required".to_string(),
            });
        }
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            errors.push(ConfigValidationError {
                field: format!("{}.backoffMultiplier", field),
                message: format!(
                    "Backoff multiplier must be a finite number >= 1.0, got {}",
                    retry.backoff_multiplier
                ),
            });
        }
    }

    fn validate_remote_feeds(
        feeds: &[RemoteFeedConfig],
        remote_enabled: bool,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let mut names = HashSet::new();

        for (i, feed) in feeds.iter().enumerate() {
            let field = format!("remoteFeeds[{}]", i);

            if feed.name.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("{}.name", field),
                    message: "Feed name is required".to_string(),
                });
            } else if !names.insert(feed.name.as_str()) {
                errors.push(ConfigValidationError {
                    field: format!("{}.name", field),
                    message: format!("Duplicate feed name: {}", feed.name),
                });
            }

            if feed.url.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("{}.url", field),
                    message: "Feed url is required".to_string(),
                });
            }

            if feed.channels.is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("{}.channels", field),
                    message: "Feed template must serve at least one channel".to_string(),
                });
            }
            for channel in &feed.channels {
                if !channel.allows_remote() {
                    errors.push(ConfigValidationError {
                        field: format!("{}.channels", field),
                        message: format!("Channel '{}' cannot be routed to a remote feed", channel),
                    });
                }
            }

            let urls = [Some(&feed.url), feed.push_url.as_ref()]
                .into_iter()
                .flatten()
                .chain(feed.promotion.as_ref().map(|p| &p.url));
            for url in urls {
                let Some(cap) = ENV_VAR_REGEX.captures(url) else {
                    continue;
                };
                let message = format!("Unresolved variable {} in {}", &cap[0], url);
                // the placeholder would end up in request URLs
                if remote_enabled {
                    errors.push(ConfigValidationError {
                        field: field.clone(),
                        message,
                    });
                } else {
                    warnings.push(ConfigValidationWarning {
                        field: field.clone(),
                        message,
                        suggestion: Some(format!("Set the {} environment variable", &cap[1])),
                    });
                }
            }

            if feed.secret_key_name.as_deref().is_none_or(str::is_empty) {
                warnings.push(ConfigValidationWarning {
                    field: format!("{}.secretKeyName", field),
                    message: format!("Feed {} has no secretKeyName and will be skipped", feed.name),
                    suggestion: Some("Add the feed secret environment variable name".to_string()),
                });
            }
        }

        if !feeds.iter().any(|f| f.serves(Channel::Release)) {
            warnings.push(ConfigValidationWarning {
                field: "remoteFeeds".to_string(),
                message: "No remote feed serves the release channel".to_string(),
                suggestion: None,
            });
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, PublishError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(PublishError::ConfigError(format!(
            "{} must be true or false, got '{}'",
            name, value
        ))),
    }
}
