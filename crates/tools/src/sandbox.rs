//! Workspace sandbox: every file tool resolves paths through here.
//!
//! Paths are resolved relative to the workspace root, normalized lexically,
//! canonicalized when they exist (so symlinks cannot escape) and rejected if
//! they end up outside the root.

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use sweloop_core::error::ToolError;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Use `root` as the sandbox. Falls back to the path as given when it
    /// cannot be canonicalized.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path to an absolute path inside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let trimmed = path.trim();
        let candidate = if trimmed.is_empty() || trimmed == "." {
            self.root.clone()
        } else {
            let raw = Path::new(trimmed);
            if raw.is_absolute() {
                raw.to_path_buf()
            } else {
                self.root.join(raw)
            }
        };

        let normalized = normalize(&candidate);
        let resolved = if normalized.exists() {
            normalized
                .canonicalize()
                .map_err(|e| ToolError::SandboxViolation(format!("Cannot resolve '{path}': {e}")))?
        } else {
            match (normalized.parent(), normalized.file_name()) {
                (Some(parent), Some(name)) if parent.exists() => parent
                    .canonicalize()
                    .map(|p| p.join(name))
                    .unwrap_or_else(|_| normalized.clone()),
                _ => normalized.clone(),
            }
        };

        if !resolved.starts_with(&self.root) {
            return Err(ToolError::SandboxViolation(format!(
                "Path '{path}' is outside the workspace"
            )));
        }
        Ok(resolved)
    }

    /// `path` relative to the root, for display.
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// A sorted walk under `root` that honours `.gitignore`, `.ignore` and the
/// git exclude files, and never enters `.git` itself.
pub(crate) fn walker(root: &Path, max_depth: Option<usize>) -> ignore::Walk {
    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .ignore(true)
        .parents(true)
        .follow_links(false)
        .require_git(false)
        .max_depth(max_depth)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| entry.file_name() != ".git")
        .build()
}

/// Compile an optional glob filter supplied by the model.
pub(crate) fn glob_filter(pattern: Option<&str>) -> Result<Option<GlobMatcher>, ToolError> {
    let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let glob = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ToolError::InvalidArguments(format!("Invalid glob pattern '{pattern}': {e}")))?;
    Ok(Some(glob.compile_matcher()))
}
