//! Built-in tool implementations for sweloop.
//!
//! Every tool is confined to one [`Workspace`] root:
//! read, list and search files, and write them with undo recording.

pub mod file_read;
pub mod file_write;
pub mod list_files;
pub mod sandbox;
pub mod search_code;

use std::path::PathBuf;
use std::sync::Arc;

use sweloop_core::tool::ToolRegistry;
use tracing::debug;

pub use file_read::FileReadTool;
pub use file_write::{FileWriteTool, undo_last};
pub use list_files::ListFilesTool;
pub use sandbox::Workspace;
pub use search_code::SearchCodeTool;

/// Create a registry with every built-in tool rooted at `root`.
pub fn default_registry(root: impl Into<PathBuf>) -> ToolRegistry {
    let workspace = Workspace::new(root);
    debug!(root = %workspace.root().display(), "Building default tool registry");
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FileReadTool::new(workspace.clone())));
    registry.register(Arc::new(ListFilesTool::new(workspace.clone())));
    registry.register(Arc::new(SearchCodeTool::new(workspace.clone())));
    registry.register(Arc::new(FileWriteTool::new(workspace)));
    registry
}
