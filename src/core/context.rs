//! Run context
//!
//! Everything a run shares is built once at startup and passed by reference to each
//! component: the effective configuration, the operator interaction, the secret store
//! and the HTTP client whose connection pool is reused by every remote feed.

use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::core::interaction::{Interaction, InteractionMode};
use crate::security::CredentialStore;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const USER_AGENT: &str = concat!("artifact-publisher/", env!("CARGO_PKG_VERSION"));

pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: PublishConfig,
    /// Directory the local feed root is searched from
    pub project_path: PathBuf,
    /// Directory holding the produced artifact files
    pub artifacts_dir: PathBuf,
    pub interaction: Arc<dyn Interaction>,
    pub credentials: CredentialStore,
    pub client: reqwest::Client,
}

impl RunContext {
    /// Build a context reading secrets from the process environment
    pub fn new(
        config: PublishConfig,
        project_path: impl Into<PathBuf>,
        interaction: Arc<dyn Interaction>,
    ) -> Result<Self, PublishError> {
        let project_path = project_path.into();
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PublishError::ConfigError(format!("Unable to create HTTP client: {}", e)))?;

        Ok(Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            artifacts_dir: project_path.join("artifacts"),
            project_path,
            interaction,
            credentials: CredentialStore::from_env(),
            client,
        })
    }

    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_artifacts_dir(mut self, artifacts_dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = artifacts_dir.into();
        self
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        self.interaction.mode()
    }
}
