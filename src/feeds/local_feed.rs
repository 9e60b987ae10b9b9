//! Local directory feed
//!
//! A local feed is a directory of artifact files named `{id}.{version}.{ext}`.
//! Pushing copies the produced file into it.

use crate::core::artifact::ArtifactInstance;
use crate::core::error::PublishError;
use crate::core::traits::{ArtifactFeed, FeedDescriptor};
use async_trait::async_trait;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalFeed {
    descriptor: FeedDescriptor,
    root: PathBuf,
}

impl LocalFeed {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            descriptor: FeedDescriptor {
                name: name.into(),
                url_or_path: root.display().to_string(),
                is_local: true,
                secret_key_name: None,
            },
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactFeed for LocalFeed {
    fn descriptor(&self) -> &FeedDescriptor {
        &self.descriptor
    }

    async fn exists(&self, artifact: &ArtifactInstance) -> Result<bool, PublishError> {
        Ok(artifact.path_in(&self.root).exists())
    }

    async fn push(
        &self,
        artifact: &ArtifactInstance,
        artifacts_dir: &Path,
        _credential: Option<&SecretString>,
    ) -> Result<(), PublishError> {
        let source = artifact.path_in(artifacts_dir);
        if !source.is_file() {
            return Err(PublishError::MissingArtifact {
                path: source.display().to_string(),
            });
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PublishError::io(self.root.display(), e))?;

        let target = artifact.path_in(&self.root);
        fs::copy(&source, &target)
            .await
            .map_err(|e| PublishError::io(target.display(), e))?;

        debug!(feed = %self.descriptor.name, file = %target.display(), "copied artifact");
        Ok(())
    }
}
