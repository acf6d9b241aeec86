//! Small text helpers shared by prompts and summaries.

/// Cut `s` to `max` characters, appending "..." when cut. The marker is
/// not counted against `max`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Hard cut of `s` to at most `max` characters, with no marker.
pub fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// First line of `s`, cut to `max` characters.
pub fn first_line(s: &str, max: usize) -> String {
    truncate_chars(s.lines().next().unwrap_or("").trim(), max)
}
