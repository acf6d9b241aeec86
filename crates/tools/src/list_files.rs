//! `list_files`: list directory entries inside the workspace.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::GlobMatcher;
use sweloop_core::error::ToolError;
use sweloop_core::tool::{Tool, ToolContext, ToolOutput};

use crate::sandbox::{Workspace, glob_filter, walker};

const DEFAULT_MAX_ENTRIES: usize = 200;

pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

struct Entry {
    path: PathBuf,
    is_dir: bool,
    size: u64,
}

/// Blocking walk; run it off the async runtime.
fn collect(dir: &Path, recursive: bool, glob: Option<&GlobMatcher>, max: usize) -> Vec<Entry> {
    let depth = if recursive { None } else { Some(1) };
    let mut out = Vec::new();
    for entry in walker(dir, depth).flatten() {
        if entry.depth() == 0 {
            continue;
        }
        if out.len() >= max {
            break;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let is_dir = meta.is_dir();
        if let Some(glob) = glob {
            let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            if is_dir || !glob.is_match(rel) {
                continue;
            }
        }
        out.push(Entry {
            path: entry.into_path(),
            is_dir,
            size: if is_dir { 0 } else { meta.len() },
        });
    }
    out
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories in the workspace with their sizes. Set recursive to walk subdirectories."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the workspace root (default: root)"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Walk subdirectories (default: false)"
                },
                "glob": {
                    "type": "string",
                    "description": "Only list files matching this glob, e.g. '*.rs' (implies files only)"
                },
                "max_entries": {
                    "type": "integer",
                    "description": "Maximum entries to return (default: 200)"
                }
            }
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");
        let recursive = arguments["recursive"].as_bool().unwrap_or(false);
        let max = arguments["max_entries"]
            .as_u64()
            .map(|m| m as usize)
            .unwrap_or(DEFAULT_MAX_ENTRIES)
            .max(1);

        let dir = self.workspace.resolve(path)?;
        ctx.check_interrupted(self.name())?;
        if !dir.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("'{path}' is not a directory (not found)"),
            });
        }

        let glob = glob_filter(arguments["glob"].as_str())?;
        let root = dir.clone();
        let entries = tokio::task::spawn_blocking(move || collect(&root, recursive, glob.as_ref(), max))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to list '{path}': {e}"),
            })?;

        if entries.is_empty() {
            return Ok(ToolOutput::text(format!("(empty directory: {})", self.workspace.relative(&dir))));
        }

        let mut lines = Vec::with_capacity(entries.len() + 1);
        let mut data = Vec::with_capacity(entries.len());
        for entry in &entries {
            let rel = self.workspace.relative(&entry.path);
            if entry.is_dir {
                lines.push(format!("{rel}/"));
            } else {
                lines.push(format!("{rel} ({} bytes)", entry.size));
            }
            data.push(serde_json::json!({ "path": rel, "dir": entry.is_dir, "size": entry.size }));
        }
        if entries.len() >= max {
            lines.push(format!("... (truncated at {max} entries)"));
        }

        Ok(ToolOutput::text(lines.join("\n")).with_data(serde_json::Value::Array(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweloop_core::monitor::TaskMonitor;

    fn setup() -> (tempfile::TempDir, ListFilesTool) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.txt"), "hi").unwrap();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(100)).unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("lib.rs"), "fn main() {}").unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target").join("app"), "bin").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("HEAD"), "ref").unwrap();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        (dir, tool)
    }

    fn ctx() -> ToolContext {
        ToolContext::permissive(TaskMonitor::new("test"))
    }

    #[tokio::test]
    async fn lists_top_level_with_sizes() {
        let (_dir, tool) = setup();
        let out = tool.execute(serde_json::json!({}), &ctx()).await.unwrap();
        assert!(out.output.contains("big.txt (100 bytes)"));
        assert!(out.output.contains("small.txt (2 bytes)"));
        assert!(out.output.contains("src/"));
        assert!(!out.output.contains("lib.rs"));
    }

    #[tokio::test]
    async fn recursive_respects_gitignore() {
        let (_dir, tool) = setup();
        let out = tool.execute(serde_json::json!({"recursive": true}), &ctx()).await.unwrap();
        assert!(out.output.contains("src/lib.rs"));
        assert!(!out.output.contains("HEAD"));
        assert!(!out.output.contains("target"));
    }

    #[tokio::test]
    async fn glob_lists_matching_files_only() {
        let (_dir, tool) = setup();
        let out = tool
            .execute(serde_json::json!({"recursive": true, "glob": "*.rs"}), &ctx())
            .await
            .unwrap();
        assert_eq!(out.output, format!("src/lib.rs ({} bytes)", "fn main() {}".len()));
    }

    #[tokio::test]
    async fn max_entries_truncates() {
        let (_dir, tool) = setup();
        let out = tool.execute(serde_json::json!({"max_entries": 1}), &ctx()).await.unwrap();
        assert!(out.output.contains("truncated at 1 entries"));
    }

    #[tokio::test]
    async fn missing_directory_fails() {
        let (_dir, tool) = setup();
        let err = tool.execute(serde_json::json!({"path": "nope"}), &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
