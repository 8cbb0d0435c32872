//! Configuration management for onair.
//!
//! Settings live in a TOML file under the user's configuration directory.
//! Missing fields fall back to defaults and defaults are not written back,
//! so the file only ever holds what the user changed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::APP_NAME;

/// Bounds on `poll_interval`, in seconds.
const MIN_POLL_INTERVAL: f32 = 0.05;
const MAX_POLL_INTERVAL: f32 = 24.0 * 60.0 * 60.0;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Seconds between reconciliation cycles
    #[serde(
        default = "default_poll_interval",
        skip_serializing_if = "is_default_poll_interval"
    )]
    pub poll_interval: f32,

    /// Durations (minutes) offered for Away
    #[serde(
        default = "default_away_presets",
        skip_serializing_if = "is_default_away_presets"
    )]
    pub away_presets: Vec<u32>,

    /// Durations (minutes) offered for timed Available and Do Not Disturb
    #[serde(
        default = "default_timed_presets",
        skip_serializing_if = "is_default_timed_presets"
    )]
    pub timed_presets: Vec<u32>,

    /// Show a desktop notification when the status changes
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub notifications: bool,

    /// Status lights driven through an external command
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "light")]
    pub lights: Vec<LightConfig>,
}

/// A status light controlled by running a command for every color change.
///
/// Each argument may contain `{r}`, `{g}`, `{b}` (decimal), `{hex}`
/// (`rrggbb`) and `{category}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LightConfig {
    /// Display name, defaults to the program name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Send black when the app exits
    #[serde(default, skip_serializing_if = "is_false")]
    pub off_on_exit: bool,
}

impl LightConfig {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.command.first().map(|program| program.as_str()))
            .unwrap_or("light")
    }
}

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn default_poll_interval() -> f32 {
    1.0
}

fn is_default_poll_interval(v: &f32) -> bool {
    (*v - default_poll_interval()).abs() < f32::EPSILON
}

fn default_away_presets() -> Vec<u32> {
    vec![15, 30, 60, 120]
}

fn is_default_away_presets(v: &Vec<u32>) -> bool {
    *v == default_away_presets()
}

fn default_timed_presets() -> Vec<u32> {
    vec![30, 60, 120]
}

fn is_default_timed_presets(v: &Vec<u32>) -> bool {
    *v == default_timed_presets()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            away_presets: default_away_presets(),
            timed_presets: default_timed_presets(),
            notifications: true,
            lights: Vec::new(),
        }
    }
}

impl Config {
    /// Get the poll interval as a Duration
    pub fn poll_interval(&self) -> Result<Duration> {
        let interval = Duration::try_from_secs_f32(self.poll_interval)
            .with_context(|| format!("poll_interval {} is not a duration", self.poll_interval))?;
        ensure!(!interval.is_zero(), "poll_interval must not be zero");
        Ok(interval)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&self.poll_interval),
            "poll_interval must be between {} and {} seconds, got {}",
            MIN_POLL_INTERVAL,
            MAX_POLL_INTERVAL,
            self.poll_interval
        );
        ensure!(
            !self.away_presets.contains(&0) && !self.timed_presets.contains(&0),
            "preset durations must be at least one minute"
        );
        for light in &self.lights {
            ensure!(
                !light.command.is_empty(),
                "light {:?} has an empty command",
                light.display_name()
            );
        }
        Ok(())
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    pub fn with_config_dir<P: AsRef<Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file at {:?}", self.config_path))?;

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval().unwrap(), Duration::from_secs(1));
        assert_eq!(config.away_presets, vec![15, 30, 60, 120]);
        assert!(config.notifications);
        assert!(config.lights.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_are_not_serialized() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(serialized.trim().is_empty());
    }

    #[test]
    fn test_parse_lights() {
        let config: Config = toml::from_str(
            r#"
            poll_interval = 2.5

            [[light]]
            name = "flag"
            command = ["luxafor", "color", "{hex}"]
            off_on_exit = true

            [[light]]
            command = ["blink1-tool", "--rgb", "{r},{g},{b}"]
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval().unwrap(), Duration::from_millis(2500));
        assert_eq!(config.lights.len(), 2);
        assert_eq!(config.lights[0].display_name(), "flag");
        assert!(config.lights[0].off_on_exit);
        assert_eq!(config.lights[1].display_name(), "blink1-tool");
        assert!(!config.lights[1].off_on_exit);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            poll_interval: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            away_presets: vec![0, 15],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            lights: vec![LightConfig {
                name: None,
                command: Vec::new(),
                off_on_exit: false,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_bounds() {
        for poll_interval in [1e-12, 0.01, 86_401.0, 1e30, f32::NAN, f32::INFINITY] {
            let config = Config {
                poll_interval,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{} accepted", poll_interval);
        }

        for poll_interval in [0.05, 86_400.0] {
            let config = Config {
                poll_interval,
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "{} rejected", poll_interval);
        }

        // Unvalidated values still never turn into a zero or panicking duration.
        let tiny = Config {
            poll_interval: 1e-12,
            ..Default::default()
        };
        assert!(tiny.poll_interval().is_err());
        let huge = Config {
            poll_interval: 1e30,
            ..Default::default()
        };
        assert!(huge.poll_interval().is_err());
    }

    #[test]
    fn test_config_manager_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path());

        // Missing file loads defaults
        assert_eq!(manager.load().unwrap(), Config::default());

        let config = Config {
            notifications: false,
            timed_presets: vec![10, 45],
            ..Default::default()
        };

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path());
        fs::write(manager.config_path(), "poll_interval = -1.0\n").unwrap();
        assert!(manager.load().is_err());
    }
}
