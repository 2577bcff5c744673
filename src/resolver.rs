use std::path::{Path, PathBuf};

use crate::error::{HostError, Result};

pub const SCRIPT_EXTENSION: &str = "jspy";
pub const FALLBACK_ROOT: &str = "src/";

/// Outcome of one resolution: every candidate in the order it was tried, and
/// the first one that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub candidates: Vec<PathBuf>,
    pub resolved: Option<PathBuf>,
}

/// Maps logical module names onto files through an ordered fallback chain:
/// `<root><name>.<ext>`, `<root><name>`, then `<fallback><name>`.
#[derive(Debug, Clone)]
pub struct PathResolver {
    working_root: PathBuf,
    extension: String,
    fallback_root: String,
}

impl PathResolver {
    pub fn new(working_root: impl Into<PathBuf>) -> Self {
        Self {
            working_root: working_root.into(),
            extension: SCRIPT_EXTENSION.to_string(),
            fallback_root: FALLBACK_ROOT.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_fallback_root(mut self, fallback_root: impl Into<String>) -> Self {
        self.fallback_root = fallback_root.into();
        self
    }

    pub fn working_root(&self) -> &Path {
        &self.working_root
    }

    pub fn candidates(&self, logical_name: &str, search_root: &str) -> Vec<PathBuf> {
        let name = normalize(logical_name);
        [
            format!("{search_root}{name}.{}", self.extension),
            format!("{search_root}{name}"),
            format!("{}{name}", self.fallback_root),
        ]
        .into_iter()
        .map(|candidate| self.working_root.join(candidate))
        .collect()
    }

    pub fn lookup(&self, logical_name: &str, search_root: &str) -> ResolvedPath {
        let candidates = self.candidates(logical_name, search_root);
        let resolved = candidates.iter().find(|path| path.is_file()).cloned();
        tracing::debug!(name = logical_name, ?resolved, "resolved module path");
        ResolvedPath {
            candidates,
            resolved,
        }
    }

    pub fn resolve(&self, logical_name: &str, search_root: &str) -> Result<PathBuf> {
        let ResolvedPath {
            candidates,
            resolved,
        } = self.lookup(logical_name, search_root);
        resolved.ok_or_else(|| HostError::Resolution {
            name: logical_name.to_string(),
            tried: candidates,
        })
    }
}

/// Trims path separators from both ends, then trailing dots.
pub fn normalize(logical_name: &str) -> &str {
    logical_name
        .trim_matches(|c| c == '/' || c == '\\')
        .trim_end_matches('.')
}

/// Ends a non-empty source root with exactly one `/`.
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}
