//! One-line summaries of tool results, stored on call records and shown in
//! events.

use sweloop_core::text::truncate_chars;

const ERROR_CHARS: usize = 200;
const INLINE_CHARS: usize = 100;

/// Summarize a tool result for history records.
///
/// `error` wins over `output`. Known tools get a shape-aware summary; the
/// rest are echoed when short and measured otherwise.
pub fn summarize_tool_result(tool_name: &str, output: Option<&str>, error: Option<&str>) -> String {
    if let Some(error) = error {
        return format!("Error: {}", truncate_chars(error, ERROR_CHARS));
    }
    let output = match output {
        Some(text) if !text.trim().is_empty() => text,
        _ => return "Success (no output)".to_string(),
    };
    let lines = output.lines().count().max(1);
    let chars = output.chars().count();

    match tool_name {
        "read_file" => format!("Read file ({lines} lines, {chars} chars)"),
        "write_file" => "File written successfully".to_string(),
        "list_files" => format!("Listed directory ({lines} items)"),
        "search_code" => {
            if output.starts_with("No matches") {
                "Search completed (0 matches)".to_string()
            } else {
                let matches = output.lines().filter(|l| !l.starts_with("...")).count();
                format!("Search completed ({matches} matches found)")
            }
        }
        _ if chars < INLINE_CHARS => output.trim().to_string(),
        _ => format!("Success ({lines} lines, {chars} chars)"),
    }
}
