//! File name and size helpers for transfer offers.

use std::path::Path;

/// Sanitize a filename advertised by a peer.
///
/// Removes path components and dangerous characters.
pub fn secure_filename(name: &str) -> String {
    // Peers may send either separator regardless of our platform
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '\0' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect();

    // Handle empty or dot-only names
    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        return "unnamed".to_string();
    }

    sanitized.to_string()
}

/// Final path component of a local file path.
pub fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| secure_filename(path))
}

/// Format a byte size as a human-readable string.
pub fn format_size(bytes: u64) -> String {
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
        format!("{} bytes", bytes)
    }
}
