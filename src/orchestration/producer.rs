//! Build step implementations
//!
//! The orchestrator only sees [`ArtifactProducer`]. Two producers ship with the
//! binary: [`PrebuiltArtifacts`] for artifacts built by an earlier CI step, and
//! [`CommandProducer`] that runs an allow-listed build command.

use crate::core::artifact::ArtifactInstance;
use crate::core::config::BuildConfig;
use crate::core::error::PublishError;
use crate::core::tool_paths::ToolPaths;
use crate::core::traits::ArtifactProducer;
use crate::security::SafeCommandExecutor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check that every artifact file is present in `artifacts_dir`
pub fn verify_artifacts(artifacts: &[ArtifactInstance], artifacts_dir: &Path) -> Result<(), PublishError> {
    if artifacts.is_empty() {
        return Ok(());
    }
    if !artifacts_dir.is_dir() {
        return Err(PublishError::MissingDirectory {
            path: artifacts_dir.display().to_string(),
        });
    }
    for artifact in artifacts {
        let path = artifact.path_in(artifacts_dir);
        if !path.is_file() {
            return Err(PublishError::MissingArtifact {
                path: path.display().to_string(),
            });
        }
        debug!(artifact = %artifact, "artifact file found");
    }
    Ok(())
}

/// Artifacts already produced before the run
#[derive(Debug, Default)]
pub struct PrebuiltArtifacts;

#[async_trait]
impl ArtifactProducer for PrebuiltArtifacts {
    fn name(&self) -> &str {
        "prebuilt"
    }

    async fn produce(
        &self,
        artifacts: &[ArtifactInstance],
        artifacts_dir: &Path,
    ) -> Result<(), PublishError> {
        verify_artifacts(artifacts, artifacts_dir)
    }
}

/// Runs the configured build command, then checks its output
#[derive(Debug)]
pub struct CommandProducer {
    build: BuildConfig,
    working_dir: PathBuf,
    tool_paths: ToolPaths,
}

impl CommandProducer {
    pub fn new(build: BuildConfig, working_dir: impl Into<PathBuf>, tool_paths: ToolPaths) -> Self {
        Self {
            build,
            working_dir: working_dir.into(),
            tool_paths,
        }
    }
}

#[async_trait]
impl ArtifactProducer for CommandProducer {
    fn name(&self) -> &str {
        &self.build.command
    }

    async fn produce(
        &self,
        artifacts: &[ArtifactInstance],
        artifacts_dir: &Path,
    ) -> Result<(), PublishError> {
        let mut executor = SafeCommandExecutor::new(&self.working_dir)
            .map_err(|e| PublishError::BuildFailed(e.to_string()))?;
        executor.set_timeout(self.build.timeout());

        // Dynamic tool paths may have appeared since startup
        let path = self
            .tool_paths
            .search_path(std::env::var_os("PATH").as_deref())?;
        executor.set_search_path(path);

        info!(command = %self.build.command, args = ?self.build.args, "running build step");
        let output = executor
            .execute(&self.build.command, &self.build.args)
            .await
            .map_err(|e| PublishError::BuildFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PublishError::BuildFailed(format!(
                "{} exited with {}: {}",
                self.build.command,
                output.status,
                stderr.trim()
            )));
        }

        verify_artifacts(artifacts, artifacts_dir)
    }
}
