//! `write_file`: create or overwrite a workspace file, recording undo.

use std::path::PathBuf;

use async_trait::async_trait;
use sweloop_core::error::ToolError;
use sweloop_core::tool::{Tool, ToolContext, ToolOutput};
use sweloop_core::undo::{UndoEntry, UndoLog};

use crate::sandbox::Workspace;

pub struct FileWriteTool {
    workspace: Workspace,
}

impl FileWriteTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a workspace file. Creates the file (and parent directories) if needed, overwrites otherwise."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "The full new file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let resolved = self.workspace.resolve(path)?;
        ctx.check_interrupted(self.name())?;
        if resolved.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("'{path}' is a directory"),
            });
        }

        let previous = match tokio::fs::read_to_string(&resolved).await {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: self.name().into(),
                    reason: format!("Failed to read existing '{path}': {e}"),
                });
            }
        };

        if let Some(parent) = resolved.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to create directory: {e}"),
            });
        }

        let created = previous.is_none();
        ctx.undo.record(UndoEntry::new(self.name(), resolved.clone(), previous));

        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to write '{path}': {e}"),
            })?;

        let rel = self.workspace.relative(&resolved);
        let verb = if created { "Created" } else { "Updated" };
        Ok(ToolOutput::text(format!("{verb} {rel} ({} bytes)", content.len())).with_data(
            serde_json::json!({ "path": rel, "bytes": content.len(), "created": created }),
        ))
    }
}

/// Restore the most recent change recorded in `log`.
///
/// Returns the restored path, or `None` when the log is empty.
pub fn undo_last(log: &UndoLog) -> std::io::Result<Option<PathBuf>> {
    let Some(entry) = log.pop() else {
        return Ok(None);
    };
    match &entry.previous_contents {
        Some(text) => std::fs::write(&entry.path, text)?,
        None => match std::fs::remove_file(&entry.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        },
    }
    Ok(Some(entry.path))
}
