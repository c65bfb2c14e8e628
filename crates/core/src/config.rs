//! Application configuration.
//!
//! Values are layered: built-in defaults, then `config.toml` in the user's
//! config directory, then `YARDSIM__*` environment variables
//! (e.g. `YARDSIM__MOTION__DURATION_MS=5000`).

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::scheduler::{MotionSettings, DEFAULT_MOVE_DURATION, DEFAULT_SAMPLE_INTERVAL};

/// Directory name under the platform config directory.
pub const CONFIG_DIR: &str = "yardsim";
const CONFIG_FILE: &str = "config.toml";

const DEFAULT_CONFIG: &str = r#"# yardsim configuration

# JSON yard layout to load instead of the built-in yard.
# layout_path = "/path/to/yard.json"

[motion]
# Time every move takes, whatever its length.
duration_ms = 3000
# Delay between position samples.
sample_interval_ms = 16

[commands]
# Refuse operator moves while any train is moving. Advisory batches are
# applied regardless.
exclusive = true

[advisor]
# HTTP endpoint of an optimizer; the built-in rotation is used when unset.
# endpoint = "http://localhost:3000/api/optimize"
max_assignments = 2
"#;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Yard layout file; the built-in yard is used when absent.
    #[serde(default)]
    pub layout_path: Option<PathBuf>,
    /// Animation timing.
    #[serde(default)]
    pub motion: MotionConfig,
    /// Command interface behaviour.
    #[serde(default)]
    pub commands: CommandConfig,
    /// Advisory source selection.
    #[serde(default)]
    pub advisor: AdvisorConfig,
}

/// Animation timing, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Time every move takes.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Delay between position samples.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_duration_ms(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

/// Command interface behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Refuse operator moves while any train is moving.
    #[serde(default = "default_exclusive")]
    pub exclusive: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            exclusive: default_exclusive(),
        }
    }
}

/// Advisory source selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// HTTP endpoint of a remote optimizer.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Maximum moves proposed by the built-in rotation.
    #[serde(default = "default_max_assignments")]
    pub max_assignments: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_assignments: default_max_assignments(),
        }
    }
}

fn default_duration_ms() -> u64 {
    DEFAULT_MOVE_DURATION.as_millis() as u64
}

fn default_sample_interval_ms() -> u64 {
    DEFAULT_SAMPLE_INTERVAL.as_millis() as u64
}

fn default_exclusive() -> bool {
    true
}

fn default_max_assignments() -> usize {
    2
}

impl AppConfig {
    /// Load from the default location plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("YARDSIM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Animation timing for the scheduler. A zero sample interval is bumped
    /// to one millisecond.
    pub fn motion_settings(&self) -> MotionSettings {
        MotionSettings {
            duration: Duration::from_millis(self.motion.duration_ms),
            sample_interval: Duration::from_millis(self.motion.sample_interval_ms.max(1)),
        }
    }
}

/// Directory holding `config.toml`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

/// Default path of `config.toml`.
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Write a commented default configuration if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_without_a_file() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("missing.toml"))?;
        assert!(config.layout_path.is_none());
        assert_eq!(config.motion.duration_ms, 3000);
        assert_eq!(config.advisor.max_assignments, 2);
        assert!(config.commands.exclusive);
        assert_eq!(config.motion_settings(), MotionSettings::default());
        Ok(())
    }

    #[test]
    fn default_file_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        assert!(write_default_config(&path)?);
        assert!(!write_default_config(&path)?);

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.motion.sample_interval_ms, 16);
        assert!(config.advisor.endpoint.is_none());
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"layout_path = "/srv/yard.json"

[motion]
duration_ms = 5000
sample_interval_ms = 0

[commands]
exclusive = false

[advisor]
endpoint = "http://localhost:3000/api/optimize"
"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.layout_path, Some(PathBuf::from("/srv/yard.json")));
        assert!(!config.commands.exclusive);
        assert_eq!(config.advisor.max_assignments, 2);
        let motion = config.motion_settings();
        assert_eq!(motion.duration, Duration::from_secs(5));
        assert_eq!(motion.sample_interval, Duration::from_millis(1));
        Ok(())
    }
}
