//! `read_file`: read file contents inside the workspace.

use async_trait::async_trait;
use sweloop_core::error::ToolError;
use sweloop_core::tool::{Tool, ToolContext, ToolOutput};

use crate::sandbox::Workspace;

/// Largest output returned in one call.
const MAX_OUTPUT_CHARS: usize = 100_000;

pub struct FileReadTool {
    workspace: Workspace,
}

impl FileReadTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file in the workspace. Optionally pass a 1-based line offset and a line limit."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace root"
                },
                "offset": {
                    "type": "integer",
                    "description": "First line to return (1-based)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return"
                }
            },
            "required": ["path"]
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let resolved = self.workspace.resolve(path)?;
        ctx.check_interrupted(self.name())?;

        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to read '{path}': {e}"),
            })?;

        let total_lines = content.lines().count();
        let offset = arguments["offset"].as_u64().unwrap_or(1).max(1) as usize;
        let limit = arguments["limit"].as_u64().map(|l| l as usize);

        let selected: String = if offset == 1 && limit.is_none() {
            content
        } else {
            let lines = content.lines().skip(offset - 1);
            let lines: Vec<&str> = match limit {
                Some(limit) => lines.take(limit).collect(),
                None => lines.collect(),
            };
            lines.join("\n")
        };

        let mut output = sweloop_core::text::truncate_chars(&selected, MAX_OUTPUT_CHARS);
        if output.is_empty() {
            output = format!("(empty file: {})", self.workspace.relative(&resolved));
        }

        Ok(ToolOutput::text(output).with_data(serde_json::json!({
            "path": self.workspace.relative(&resolved),
            "total_lines": total_lines,
        })))
    }
}
