//! Tool directories added to the build step PATH
//!
//! Each configured entry is a directory pattern whose components may contain `*`
//! wildcards. Static entries are expanded once when [`ToolPaths`] is built; dynamic
//! entries are expanded again on every [`ToolPaths::search_path`] call, for tools
//! that are installed by an earlier step of the run.

use crate::core::config::ToolPathConfig;
use crate::core::error::PublishError;
use regex::Regex;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ToolPaths {
    base: PathBuf,
    static_dirs: Vec<PathBuf>,
    dynamic_patterns: Vec<String>,
}

impl ToolPaths {
    /// Resolve the static entries relative to `base`
    pub fn resolve(base: impl Into<PathBuf>, entries: &[ToolPathConfig]) -> Self {
        let base = base.into();
        let mut static_dirs = Vec::new();
        let mut dynamic_patterns = Vec::new();

        for entry in entries {
            if entry.dynamic {
                dynamic_patterns.push(entry.pattern.clone());
            } else {
                for dir in expand(&base, &entry.pattern) {
                    if !static_dirs.contains(&dir) {
                        static_dirs.push(dir);
                    }
                }
            }
        }

        Self {
            base,
            static_dirs,
            dynamic_patterns,
        }
    }

    /// Current tool directories: static ones first, then the dynamic ones
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = self.static_dirs.clone();
        for pattern in &self.dynamic_patterns {
            for dir in expand(&self.base, pattern) {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
        dirs
    }

    /// Tool directories prepended to an existing PATH value
    pub fn search_path(&self, existing: Option<&OsStr>) -> Result<OsString, PublishError> {
        let mut paths = self.directories();
        if let Some(existing) = existing {
            paths.extend(std::env::split_paths(existing));
        }
        std::env::join_paths(paths)
            .map_err(|e| PublishError::ConfigError(format!("Invalid tool path: {}", e)))
    }
}

/// Expand a directory pattern into the existing directories it matches
fn expand(base: &Path, pattern: &str) -> Vec<PathBuf> {
    let pattern_path = Path::new(pattern);
    let root = if pattern_path.is_absolute() {
        PathBuf::new()
    } else {
        base.to_path_buf()
    };

    let mut candidates = vec![root];
    for component in pattern_path.components() {
        let part = match component {
            Component::Normal(part) => part.to_string_lossy().into_owned(),
            other => {
                candidates = candidates
                    .into_iter()
                    .map(|c| c.join(other.as_os_str()))
                    .collect();
                continue;
            }
        };

        if !part.contains('*') {
            candidates = candidates.into_iter().map(|c| c.join(&part)).collect();
            continue;
        }

        let Ok(matcher) = wildcard_regex(&part) else {
            return Vec::new();
        };
        candidates = candidates
            .into_iter()
            .flat_map(|dir| {
                let mut children: Vec<PathBuf> = WalkDir::new(&dir)
                    .min_depth(1)
                    .max_depth(1)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_dir())
                    .filter(|e| matcher.is_match(&e.file_name().to_string_lossy()))
                    .map(|e| e.into_path())
                    .collect();
                children.sort();
                children
            })
            .collect();
    }

    candidates.into_iter().filter(|c| c.is_dir()).collect()
}

fn wildcard_regex(part: &str) -> Result<Regex, regex::Error> {
    let escaped: Vec<String> = part.split('*').map(regex::escape).collect();
    Regex::new(&format!("^{}$", escaped.join(".*")))
}
