//! Configuration for replterm.
//!
//! Settings are read from `~/.replterm/config.toml`; every key is optional.
//!
//! ```toml
//! # Backend program, looked up on PATH
//! command = "nlbt"
//! args = []
//!
//! title = "NLBT"
//! sentinel = "👋 nlbt exited"
//!
//! # Lines of transcript kept on screen
//! transcript_limit = 100
//!
//! # Busy indicator duration after each submission
//! busy_delay_ms = 100
//!
//! echo_input = false
//! exit_on_terminate = false
//!
//! [theme]
//! title = { r = 0, g = 255, b = 255 }
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::shell::ShellOptions;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend program
    pub command: String,
    /// Arguments passed to the backend
    pub args: Vec<String>,
    /// Text shown in the title row
    pub title: String,
    /// Line appended when the backend exits
    pub sentinel: String,
    /// Maximum transcript lines shown
    pub transcript_limit: usize,
    /// Busy indicator duration in milliseconds
    pub busy_delay_ms: u64,
    /// Log submitted lines into the transcript
    pub echo_input: bool,
    /// Quit as soon as the backend exits
    pub exit_on_terminate: bool,
    /// Colors
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: "nlbt".to_string(),
            args: Vec::new(),
            title: "NLBT".to_string(),
            sentinel: "👋 nlbt exited".to_string(),
            transcript_limit: 100,
            busy_delay_ms: 100,
            echo_input: false,
            exit_on_terminate: false,
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) if path.exists() => match fs::read_to_string(&path) {
                Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                    warn!("Ignoring invalid config {}: {}", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn busy_delay(&self) -> Duration {
        Duration::from_millis(self.busy_delay_ms)
    }

    /// Options for the session shell
    pub fn shell_options(&self) -> ShellOptions {
        ShellOptions {
            sentinel: self.sentinel.clone(),
            transcript_limit: self.transcript_limit,
            busy_delay: self.busy_delay(),
            echo_input: self.echo_input,
        }
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Colors used by the renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub title: Color,
    pub prompt: Color,
    pub busy: Color,
    pub error: Color,
    pub sentinel: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            // cyanBright / gray / yellow, as in the classic Ink layout
            title: Color::new(0, 255, 255),
            prompt: Color::new(128, 128, 128),
            busy: Color::new(255, 255, 0),
            error: Color::new(255, 85, 85),
            sentinel: Color::new(150, 150, 150),
        }
    }
}

/// `~/.replterm`, created on demand
pub fn config_dir() -> Option<PathBuf> {
    let dir = home_dir()?.join(".replterm");
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.command, "nlbt");
        assert!(config.args.is_empty());
        assert_eq!(config.transcript_limit, 100);
        assert_eq!(config.busy_delay(), Duration::from_millis(100));
        assert!(!config.exit_on_terminate);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            command = "python3"
            args = ["-i", "-q"]
            busy_delay_ms = 250

            [theme]
            busy = { r = 1, g = 2, b = 3 }
            "#,
        )
        .unwrap();

        assert_eq!(config.command, "python3");
        assert_eq!(config.args, ["-i", "-q"]);
        assert_eq!(config.title, "NLBT");
        assert_eq!(config.theme.busy, Color::new(1, 2, 3));
        assert_eq!(config.theme.title, Theme::default().title);

        let options = config.shell_options();
        assert_eq!(options.busy_delay, Duration::from_millis(250));
        assert_eq!(options.sentinel, "👋 nlbt exited");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Config::parse("transcript_limit = \"lots\"").is_err());
    }
}
