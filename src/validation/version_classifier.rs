//! Version Classifier - Maps a repository version to its release channel
//!
//! The channel drives feed routing: release builds go to the release feeds, other
//! tagged prereleases to the preview feeds, untagged commits to the CI feeds, and
//! `.local`/`.blank` builds never leave the machine.
//!
//! # Example
//!
//! ```
//! use artifact_publisher::validation::{Channel, RepositoryVersionInfo, classify};
//!
//! let info = RepositoryVersionInfo::parse("1.2.3");
//! assert_eq!(classify(&info), Channel::Release);
//!
//! let info = RepositoryVersionInfo::parse("1.2.3-ci.5");
//! assert_eq!(classify(&info), Channel::CI);
//! ```

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prerelease names that denote a tagged (release) version
const RELEASE_PRERELEASE_NAMES: &[&str] = &[
    "alpha",
    "beta",
    "delta",
    "epsilon",
    "gamma",
    "kappa",
    "prerelease",
    "rc",
];

/// Prerelease names published to the release channel (release candidates)
const RELEASE_CANDIDATE_NAMES: &[&str] = &["prerelease", "rc"];

const LOCAL_MARKER: &str = "local";
const BLANK_MARKER: &str = "blank";

/// Release channel derived from a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Release,
    Preview,
    CI,
    Local,
    Blank,
    Invalid,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Release => "release",
            Channel::Preview => "preview",
            Channel::CI => "ci",
            Channel::Local => "local",
            Channel::Blank => "blank",
            Channel::Invalid => "invalid",
        }
    }

    /// Whether artifacts of this channel may ever reach a remote feed
    pub fn allows_remote(&self) -> bool {
        matches!(self, Channel::Release | Channel::Preview | Channel::CI)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version information computed once per run from the working folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryVersionInfo {
    pub is_valid: bool,
    pub is_valid_release: bool,
    pub is_valid_ci_build: bool,
    /// Full prerelease text (e.g. "beta.1", "ci.5", "0.local"), empty for stable versions
    pub prerelease_label: String,
    /// Version text used in artifact file names
    pub normalized_version: String,
}

impl RepositoryVersionInfo {
    /// An invalid version: nothing can be published
    pub fn invalid(text: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            is_valid_release: false,
            is_valid_ci_build: false,
            prerelease_label: String::new(),
            normalized_version: text.into(),
        }
    }

    /// Derive version info from a semantic version string
    ///
    /// Stable versions and versions whose first prerelease identifier is a known
    /// prerelease name are releases; every other prerelease is a CI build.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim().trim_start_matches('v');
        let Ok(version) = Version::parse(trimmed) else {
            return Self::invalid(trimmed);
        };

        let prerelease_label = version.pre.as_str().to_string();
        let first = prerelease_label.split('.').next().unwrap_or_default();
        let is_valid_release =
            prerelease_label.is_empty() || RELEASE_PRERELEASE_NAMES.contains(&first);

        // Build metadata is not part of artifact file names
        let mut normalized = version.clone();
        normalized.build = semver::BuildMetadata::EMPTY;

        Self {
            is_valid: true,
            is_valid_release,
            is_valid_ci_build: !is_valid_release,
            prerelease_label,
            normalized_version: normalized.to_string(),
        }
    }

    /// First identifier of the prerelease label ("beta" for "beta.1")
    pub fn prerelease_name(&self) -> &str {
        self.prerelease_label.split('.').next().unwrap_or_default()
    }
}

fn ends_with_marker(label: &str, marker: &str) -> bool {
    label == marker || label.ends_with(&format!(".{}", marker))
}

/// Classify a version into its release channel
///
/// Pure: the same input always yields the same channel.
pub fn classify(info: &RepositoryVersionInfo) -> Channel {
    if !info.is_valid {
        return Channel::Invalid;
    }
    let label = info.prerelease_label.as_str();
    if ends_with_marker(label, LOCAL_MARKER) {
        return Channel::Local;
    }
    if ends_with_marker(label, BLANK_MARKER) {
        return Channel::Blank;
    }
    if info.is_valid_release {
        if label.is_empty() || RELEASE_CANDIDATE_NAMES.contains(&info.prerelease_name()) {
            return Channel::Release;
        }
        return Channel::Preview;
    }
    Channel::CI
}

/// Quality of a package version, used to pick the views it is promoted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackageQuality {
    CI,
    Exploratory,
    Preview,
    ReleaseCandidate,
    Stable,
}

/// View labels, ordered by increasing quality
const VIEW_LABELS: &[(PackageQuality, &str)] = &[
    (PackageQuality::CI, "CI"),
    (PackageQuality::Exploratory, "Exploratory"),
    (PackageQuality::Preview, "Preview"),
    (PackageQuality::ReleaseCandidate, "Latest"),
    (PackageQuality::Stable, "Stable"),
];

impl PackageQuality {
    /// Quality of a version text; unparseable versions are CI quality
    pub fn of(version: &str) -> Self {
        let Ok(version) = Version::parse(version) else {
            return PackageQuality::CI;
        };
        if version.pre.is_empty() {
            return PackageQuality::Stable;
        }
        match version.pre.as_str().split('.').next().unwrap_or_default() {
            "alpha" | "beta" | "delta" => PackageQuality::Exploratory,
            "epsilon" | "gamma" | "kappa" | "prerelease" => PackageQuality::Preview,
            "rc" => PackageQuality::ReleaseCandidate,
            _ => PackageQuality::CI,
        }
    }

    /// Every view this quality belongs to: a package is visible in all views up to its own
    pub fn view_labels(&self) -> Vec<&'static str> {
        VIEW_LABELS
            .iter()
            .filter(|(quality, _)| quality <= self)
            .map(|(_, label)| *label)
            .collect()
    }
}
