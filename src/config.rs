//! Configuration module for cliconf
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/cliconf/cliconf.toml)
//! - User configuration (~/.cliconf.toml, ~/.cliconf/config.toml)
//! - Project configuration (./cliconf.toml)
//! - Environment variables
//! - Command-line arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::{Platform, Scheduling, DEFAULT_TIMEOUT};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// Session settings
    pub session: SessionConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Colors and output settings
    pub colors: ColorsConfig,

    /// Directories of unit definition files
    pub unit_paths: Vec<PathBuf>,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Platform assumed when a unit or command does not name one
    pub platform: Platform,

    /// Per-exchange timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Concurrent-call policy
    pub scheduling: Scheduling,

    /// Send the dialect's preparation lines when a session opens
    pub prepare: bool,

    /// Prompt pattern for process transports
    pub prompt: Option<String>,

    /// Program spawned by `apply --program` when none is given
    pub program: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scheduling: Scheduling::default(),
            prepare: true,
            prompt: None,
            program: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}. Valid options: text, json", s)),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when neither `-v` nor `RUST_LOG` is given
    pub level: Option<String>,

    /// Log format
    pub format: LogFormat,
}

/// Colors configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colors
    pub enabled: bool,

    /// Added lines and fields
    pub added: String,

    /// Removed lines and fields
    pub removed: String,

    /// Modified fields
    pub changed: String,

    /// Headings
    pub highlight: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            added: "green".to_string(),
            removed: "red".to_string(),
            changed: "yellow".to_string(),
            highlight: "cyan".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            } else if config_path == Some(&path) {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }
        if let Ok(env_config) = std::env::var("CLICONF_CONFIG") {
            return vec![PathBuf::from(env_config)];
        }

        let mut paths = vec![PathBuf::from("/etc/cliconf/cliconf.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".cliconf.toml"));
            paths.push(home.join(".cliconf/config.toml"));
        }
        paths.push(PathBuf::from("cliconf.toml"));
        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => {
                // .cfg and friends: TOML first, then YAML
                toml::from_str(&content)
                    .or_else(|_| serde_yaml::from_str(&content))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; values of `other` that differ
    /// from the defaults win.
    fn merge(&self, other: Config) -> Config {
        let defaults = Config::default();
        Config {
            defaults: Defaults {
                platform: if other.defaults.platform != defaults.defaults.platform {
                    other.defaults.platform
                } else {
                    self.defaults.platform
                },
                timeout: if other.defaults.timeout != defaults.defaults.timeout {
                    other.defaults.timeout
                } else {
                    self.defaults.timeout
                },
            },
            session: SessionConfig {
                scheduling: if other.session.scheduling != defaults.session.scheduling {
                    other.session.scheduling
                } else {
                    self.session.scheduling
                },
                prepare: other.session.prepare && self.session.prepare,
                prompt: other.session.prompt.or_else(|| self.session.prompt.clone()),
                program: other.session.program.or_else(|| self.session.program.clone()),
            },
            logging: LoggingConfig {
                level: other.logging.level.or_else(|| self.logging.level.clone()),
                format: if other.logging.format != LogFormat::default() {
                    other.logging.format
                } else {
                    self.logging.format
                },
            },
            colors: if other.colors != defaults.colors {
                other.colors
            } else {
                self.colors.clone()
            },
            unit_paths: {
                let mut paths = self.unit_paths.clone();
                for path in other.unit_paths {
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
                paths
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // CLICONF_TIMEOUT: humantime ("45s", "2m") or plain seconds
        if let Ok(timeout) = std::env::var("CLICONF_TIMEOUT") {
            if let Some(d) = parse_duration(&timeout) {
                self.defaults.timeout = d;
            }
        }

        // CLICONF_PLATFORM
        if let Ok(platform) = std::env::var("CLICONF_PLATFORM") {
            if let Ok(p) = platform.parse() {
                self.defaults.platform = p;
            }
        }

        // CLICONF_SCHEDULING
        if let Ok(scheduling) = std::env::var("CLICONF_SCHEDULING") {
            if let Ok(s) = scheduling.parse() {
                self.session.scheduling = s;
            }
        }

        // CLICONF_UNIT_PATH: platform path list
        if let Ok(paths) = std::env::var("CLICONF_UNIT_PATH") {
            for path in std::env::split_paths(&paths) {
                if !self.unit_paths.contains(&path) {
                    self.unit_paths.push(path);
                }
            }
        }

        // CLICONF_LOG_FORMAT
        if let Ok(format) = std::env::var("CLICONF_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() || std::env::var("CLICONF_NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Load from a specific file only
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

/// Parse `"30s"`, `"1m 30s"` or a bare number of seconds.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    text.parse::<u64>()
        .ok()
        .map(Duration::from_secs)
        .or_else(|| humantime_serde::re::humantime::parse_duration(text).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.timeout, Duration::from_secs(30));
        assert_eq!(config.defaults.platform, Platform::CiscoIos);
        assert_eq!(config.session.scheduling, Scheduling::Queue);
        assert!(config.session.prepare);
        assert!(config.colors.enabled);
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            unit_paths: vec![PathBuf::from("/etc/cliconf/units")],
            ..Config::default()
        };
        let other = Config {
            defaults: Defaults {
                platform: Platform::CasaCer,
                ..Defaults::default()
            },
            unit_paths: vec![PathBuf::from("units")],
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.platform, Platform::CasaCer);
        assert_eq!(merged.defaults.timeout, DEFAULT_TIMEOUT);
        assert_eq!(merged.unit_paths.len(), 2);
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cliconf.toml");
        std::fs::write(
            &path,
            "[defaults]\nplatform = \"casa_cer\"\ntimeout = \"45s\"\n\n[session]\nscheduling = \"fail_fast\"\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.defaults.platform, Platform::CasaCer);
        assert_eq!(config.defaults.timeout, Duration::from_secs(45));
        assert_eq!(config.session.scheduling, Scheduling::FailFast);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_cfg_falls_back_to_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cliconf.cfg");
        std::fs::write(&path, "defaults:\n  platform: juniper_junos\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.defaults.platform, Platform::JuniperJunos);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("CLICONF_TIMEOUT", "2m");
        std::env::set_var("CLICONF_PLATFORM", "iosxr");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.defaults.timeout, Duration::from_secs(120));
        assert_eq!(config.defaults.platform, Platform::CiscoIosXr);
        std::env::remove_var("CLICONF_TIMEOUT");
        std::env::remove_var("CLICONF_PLATFORM");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m 30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("soon"), None);
    }
}
