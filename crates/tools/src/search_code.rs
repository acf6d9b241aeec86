//! `search_code`: case-insensitive substring search across workspace files.

use std::path::Path;

use async_trait::async_trait;
use globset::GlobMatcher;
use sweloop_core::error::ToolError;
use sweloop_core::monitor::TaskMonitor;
use sweloop_core::text::truncate_chars;
use sweloop_core::tool::{Tool, ToolContext, ToolOutput};

use crate::sandbox::{Workspace, glob_filter, walker};

const DEFAULT_MAX_RESULTS: usize = 50;
const MAX_LINE_CHARS: usize = 200;
/// Files larger than this are skipped.
const MAX_FILE_BYTES: u64 = 1_000_000;

pub struct SearchCodeTool {
    workspace: Workspace,
}

impl SearchCodeTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

struct Search {
    workspace: Workspace,
    needle: String,
    glob: Option<GlobMatcher>,
    max: usize,
    hits: Vec<String>,
}

impl Search {
    /// Blocking walk; returns `false` when the monitor fired midway.
    fn run(&mut self, root: &Path, monitor: &TaskMonitor) -> bool {
        if root.is_file() {
            self.search_file(root);
            return true;
        }
        for entry in walker(root, None).flatten() {
            if self.hits.len() >= self.max {
                break;
            }
            if monitor.is_interrupted() {
                return false;
            }
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Some(glob) = &self.glob {
                let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                if !glob.is_match(rel) {
                    continue;
                }
            }
            if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
                continue;
            }
            self.search_file(entry.path());
        }
        true
    }

    fn search_file(&mut self, path: &Path) {
        let Ok(bytes) = std::fs::read(path) else {
            return;
        };
        if bytes.contains(&0) {
            return;
        }
        let text = String::from_utf8_lossy(&bytes);
        let rel = self.workspace.relative(path);
        for (n, line) in text.lines().enumerate() {
            if self.hits.len() >= self.max {
                return;
            }
            if line.to_lowercase().contains(&self.needle) {
                self.hits
                    .push(format!("{rel}:{}: {}", n + 1, truncate_chars(line.trim(), MAX_LINE_CHARS)));
            }
        }
    }
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn description(&self) -> &str {
        "Search workspace files for a text pattern (case-insensitive). Returns path:line: text matches."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory or file to search (default: workspace root)"
                },
                "glob": {
                    "type": "string",
                    "description": "Only search files matching this glob, e.g. '*.rs'"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum matches to return (default: 50)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let pattern = arguments["pattern"]
            .as_str()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'pattern' argument".into()))?;
        let path = arguments["path"].as_str().unwrap_or(".");
        let max = arguments["max_results"]
            .as_u64()
            .map(|m| m as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .max(1);

        let root = self.workspace.resolve(path)?;
        if !root.exists() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("'{path}' not found"),
            });
        }
        ctx.check_interrupted(self.name())?;

        let mut search = Search {
            workspace: self.workspace.clone(),
            needle: pattern.to_lowercase(),
            glob: glob_filter(arguments["glob"].as_str())?,
            max,
            hits: Vec::new(),
        };
        let monitor = ctx.monitor.clone();
        let (completed, hits) = tokio::task::spawn_blocking(move || {
            let completed = search.run(&root, &monitor);
            (completed, search.hits)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: format!("Search failed: {e}"),
        })?;
        if !completed {
            return Err(ToolError::Interrupted(self.name().into()));
        }

        if hits.is_empty() {
            return Ok(ToolOutput::text(format!("No matches for '{pattern}'")));
        }
        let count = hits.len();
        let mut output = hits.join("\n");
        if count >= max {
            output.push_str(&format!("\n... (stopped at {max} matches)"));
        }
        Ok(ToolOutput::text(output).with_data(serde_json::json!({ "matches": count })))
    }
}
