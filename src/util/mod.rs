//! Utility functions and helpers

use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

pub fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "tollgate", "tollgate").map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn get_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "tollgate", "tollgate").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Truncates on a char boundary, appending `...` when shortened.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Formats a byte count using binary (1024-based) units.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Formats an elapsed time in milliseconds for display, e.g. `1s 250ms`.
pub fn format_elapsed(millis: u64) -> String {
    if millis == 0 {
        return "0ms".to_string();
    }
    humantime::format_duration(Duration::from_millis(millis)).to_string()
}

/// Formats `count` with the matching noun form, e.g. `1 file` / `3 files`.
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}
