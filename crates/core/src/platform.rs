//! Cross-platform paths.

use std::path::PathBuf;

/// Get the configuration directory.
///
/// - Linux: `~/.config/lanchat`
/// - Windows: `%APPDATA%\lanchat`
/// - macOS: `~/Library/Application Support/lanchat`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lanchat")
}

/// Get the cache directory (avatars received from peers).
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lanchat")
}

/// Get the path to the main config file.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Cached avatar image for a user id.
pub fn avatar_path(user_id: &str) -> PathBuf {
    cache_dir().join(format!("avt_{}.png", user_id))
}
