//! Artifact records
//!
//! An [`ArtifactInstance`] is created once per publishable project at resolve time and
//! never mutated afterwards. Its identity is its name.

use crate::core::error::PublishError;
use crate::validation::RepositoryVersionInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Package format of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    #[default]
    NuGet,
    Npm,
}

impl ArtifactKind {
    /// File extension of a packaged artifact
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::NuGet => "nupkg",
            ArtifactKind::Npm => "tgz",
        }
    }

    /// Protocol name used by promotion endpoints
    pub fn protocol_type(&self) -> &'static str {
        match self {
            ArtifactKind::NuGet => "NuGet",
            ArtifactKind::Npm => "Npm",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.protocol_type())
    }
}

/// A named, versioned publishable unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactInstance {
    pub kind: ArtifactKind,
    pub name: String,
    pub version: String,
}

impl ArtifactInstance {
    pub fn new(kind: ArtifactKind, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            version: version.into(),
        }
    }

    /// Identity of the artifact within a run
    pub fn id(&self) -> &str {
        &self.name
    }

    /// Deterministic file name: `{id}.{version}.{ext}`
    pub fn file_name(&self) -> String {
        format!("{}.{}.{}", self.name, self.version, self.kind.extension())
    }

    /// Path of the artifact file inside a directory
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for ArtifactInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.version)
    }
}

/// Global artifact set of a run, keyed by identity
pub type ArtifactSet = BTreeMap<String, ArtifactInstance>;

/// Maps publishable project identifiers and the repository version to artifact records
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    kind: ArtifactKind,
}

impl ArtifactResolver {
    pub fn new(kind: ArtifactKind) -> Self {
        Self { kind }
    }

    /// Resolve the artifact set
    ///
    /// An invalid version yields an empty set. Project names must be non-empty and
    /// contain no path separator; a name listed twice is resolved once.
    pub fn resolve<S: AsRef<str>>(
        &self,
        projects: &[S],
        version: &RepositoryVersionInfo,
    ) -> Result<ArtifactSet, PublishError> {
        let mut artifacts = ArtifactSet::new();
        if !version.is_valid {
            return Ok(artifacts);
        }

        for project in projects {
            let name = project.as_ref().trim();
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(PublishError::ConfigError(format!(
                    "Invalid project name: '{}'",
                    project.as_ref()
                )));
            }
            artifacts.entry(name.to_string()).or_insert_with(|| {
                ArtifactInstance::new(self.kind, name, version.normalized_version.clone())
            });
        }

        Ok(artifacts)
    }
}
