//! Session configuration.
//!
//! Display and behaviour preferences are handed to each session explicitly
//! rather than read from global settings.

use crate::error::{Error, Result};
use crate::platform;
use crate::presence::PAUSE_DELAY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Message log theme.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Classic,
    Bubble,
    Plain,
}

impl std::str::FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(Theme::Classic),
            "bubble" => Ok(Theme::Bubble),
            "plain" => Ok(Theme::Plain),
            other => Err(Error::Config(format!("unknown theme: {}", other))),
        }
    }
}

/// Preferences applied to a chat session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Local user's display name.
    #[serde(default)]
    pub display_name: String,

    /// Font descriptor attached to outgoing messages.
    #[serde(default = "default_font")]
    pub font: String,

    /// Text color attached to outgoing messages.
    #[serde(default = "default_color")]
    pub color: String,

    /// Message log theme.
    #[serde(default)]
    pub theme: Theme,

    /// Quiet period before composing settles to paused/active.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,

    /// Save the conversation to history when the session closes.
    #[serde(default = "default_true")]
    pub save_history: bool,

    /// Show message times in the log.
    #[serde(default = "default_true")]
    pub message_time: bool,

    /// Show message dates in the log.
    #[serde(default)]
    pub message_date: bool,

    /// Trim surrounding whitespace from outgoing messages.
    #[serde(default = "default_true")]
    pub trim_message: bool,
}

fn default_font() -> String {
    "Sans Serif,10,-1,5,50,0,0,0,0,0".to_string()
}

fn default_color() -> String {
    "#000000".to_string()
}

fn default_pause_ms() -> u64 {
    PAUSE_DELAY.as_millis() as u64
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            font: default_font(),
            color: default_color(),
            theme: Theme::default(),
            pause_ms: default_pause_ms(),
            save_history: true,
            message_time: true,
            message_date: false,
            trim_message: true,
        }
    }
}

impl SessionConfig {
    /// chrono format for log timestamps, or `None` when neither time nor date is shown.
    pub fn timestamp_format(&self) -> Option<&'static str> {
        match (self.message_date, self.message_time) {
            (true, true) => Some("%Y-%m-%d %H:%M:%S"),
            (true, false) => Some("%Y-%m-%d"),
            (false, true) => Some("%H:%M:%S"),
            (false, false) => None,
        }
    }

    /// Debounce delay as a duration.
    pub fn pause_delay(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    /// Load configuration from the default config file.
    pub fn load() -> Result<Self> {
        Self::load_from(&platform::config_file_path())
    }

    /// Load configuration from a specific file, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let mut config: SessionConfig = serde_json::from_str(&contents)?;
            config.fix_invalid_values();
            Ok(config)
        } else {
            Ok(SessionConfig::default())
        }
    }

    /// Fix any invalid or empty values with sensible defaults.
    fn fix_invalid_values(&mut self) {
        if self.pause_ms == 0 {
            self.pause_ms = default_pause_ms();
        }
        if self.font.is_empty() {
            self.font = default_font();
        }
        if self.color.is_empty() {
            self.color = default_color();
        }
    }

    /// Save configuration to the default config file.
    pub fn save(&mut self) -> Result<()> {
        self.save_to(&platform::config_file_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        self.fix_invalid_values();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Load configuration, then apply environment overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(ms) = std::env::var("LANCHAT_PAUSE_MS") {
            self.pause_ms = ms
                .parse()
                .map_err(|_| Error::Config(format!("invalid LANCHAT_PAUSE_MS: {}", ms)))?;
            self.fix_invalid_values();
        }

        if let Ok(theme) = std::env::var("LANCHAT_THEME") {
            self.theme = theme.parse()?;
        }

        if let Ok(name) = std::env::var("LANCHAT_NAME") {
            self.display_name = name;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_pause_delay() {
        let config = SessionConfig::default();
        assert_eq!(config.pause_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = SessionConfig {
            display_name: "Alice".to_string(),
            theme: Theme::Bubble,
            pause_ms: 0,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = SessionConfig::load_from(&path).unwrap();
        assert_eq!(loaded.display_name, "Alice");
        assert_eq!(loaded.theme, Theme::Bubble);
        assert_eq!(loaded.pause_ms, 5000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = SessionConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, SessionConfig::default());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"display_name":"Bob"}"#).unwrap();
        assert_eq!(config.display_name, "Bob");
        assert!(config.save_history);
        assert_eq!(config.pause_ms, 5000);
    }

    #[test]
    fn test_timestamp_format() {
        let mut config = SessionConfig::default();
        assert_eq!(config.timestamp_format(), Some("%H:%M:%S"));
        config.message_date = true;
        assert_eq!(config.timestamp_format(), Some("%Y-%m-%d %H:%M:%S"));
        config.message_time = false;
        assert_eq!(config.timestamp_format(), Some("%Y-%m-%d"));
        config.message_date = false;
        assert_eq!(config.timestamp_format(), None);
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Bubble".parse::<Theme>().unwrap(), Theme::Bubble);
        assert!("neon".parse::<Theme>().is_err());
    }
}
